use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskmesh_core::text::split_list;

use crate::rpc::SUCCESS_CODE;
use crate::value_objects::{
    AddressType, BlockStrategy, GlueType, MisfireStrategy, RouteStrategy, ScheduleType,
};

/// 任务定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefinition {
    pub id: i64,
    pub job_group: i64,
    pub job_desc: String,
    pub schedule_type: ScheduleType,
    /// CRON 表达式或固定速度的秒数
    pub schedule_conf: Option<String>,
    pub misfire_strategy: MisfireStrategy,
    pub executor_route_strategy: RouteStrategy,
    pub executor_handler: String,
    pub executor_param: Option<String>,
    pub executor_block_strategy: BlockStrategy,
    /// 秒，0 表示不限制
    pub executor_timeout: i32,
    pub executor_fail_retry_count: i32,
    pub glue_type: GlueType,
    pub glue_source: Option<String>,
    /// 毫秒时间戳
    pub glue_updatetime: i64,
    /// 子任务ID，多个以逗号分隔
    pub child_job_id: Option<String>,
    pub trigger_status: bool,
    pub trigger_last_time: i64,
    pub trigger_next_time: i64,
}

impl Default for JobDefinition {
    fn default() -> Self {
        Self {
            id: 0,
            job_group: 0,
            job_desc: String::new(),
            schedule_type: ScheduleType::None,
            schedule_conf: None,
            misfire_strategy: MisfireStrategy::DoNothing,
            executor_route_strategy: RouteStrategy::First,
            executor_handler: String::new(),
            executor_param: None,
            executor_block_strategy: BlockStrategy::SerialExecution,
            executor_timeout: 0,
            executor_fail_retry_count: 0,
            glue_type: GlueType::Bean,
            glue_source: None,
            glue_updatetime: 0,
            child_job_id: None,
            trigger_status: false,
            trigger_last_time: 0,
            trigger_next_time: 0,
        }
    }
}

impl JobDefinition {
    /// 子任务ID原始列表，未做数字校验
    ///
    /// 中间的空项保留，由调用方记为格式错误；末尾的空项忽略。
    pub fn child_job_ids(&self) -> Vec<String> {
        let Some(raw) = self.child_job_id.as_deref().map(str::trim) else {
            return Vec::new();
        };
        if raw.is_empty() {
            return Vec::new();
        }
        let mut items: Vec<String> = raw.split(',').map(|item| item.trim().to_string()).collect();
        while items.last().is_some_and(|item| item.is_empty()) {
            items.pop();
        }
        items
    }
}

/// 执行器分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorGroup {
    pub id: i64,
    pub app_name: String,
    pub title: String,
    pub address_type: AddressType,
    /// 逗号分隔的执行器地址
    pub address_list: Option<String>,
    pub update_time: DateTime<Utc>,
}

impl Default for ExecutorGroup {
    fn default() -> Self {
        Self {
            id: 0,
            app_name: String::new(),
            title: String::new(),
            address_type: AddressType::Auto,
            address_list: None,
            update_time: Utc::now(),
        }
    }
}

impl ExecutorGroup {
    pub fn registry_list(&self) -> Vec<String> {
        self.address_list
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }
}

/// 一次调度对应的日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLog {
    pub id: i64,
    pub job_group: i64,
    pub job_id: i64,
    pub executor_address: Option<String>,
    pub executor_handler: Option<String>,
    pub executor_param: Option<String>,
    pub executor_sharding_param: Option<String>,
    pub executor_fail_retry_count: i32,
    pub trigger_time: DateTime<Utc>,
    /// 0 表示尚未调度
    pub trigger_code: i32,
    pub trigger_msg: Option<String>,
    pub handle_time: Option<DateTime<Utc>>,
    /// 0 表示执行结果尚未回调
    pub handle_code: i32,
    pub handle_msg: Option<String>,
    pub alarm_status: i32,
}

pub const ALARM_STATUS_DEFAULT: i32 = 0;
pub const ALARM_STATUS_LOCKED: i32 = -1;
pub const ALARM_STATUS_PROCESSED: i32 = 1;

impl JobLog {
    pub fn pending(job_group: i64, job_id: i64, trigger_time: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            job_group,
            job_id,
            executor_address: None,
            executor_handler: None,
            executor_param: None,
            executor_sharding_param: None,
            executor_fail_retry_count: 0,
            trigger_time,
            trigger_code: 0,
            trigger_msg: None,
            handle_time: None,
            handle_code: 0,
            handle_msg: None,
            alarm_status: ALARM_STATUS_DEFAULT,
        }
    }

    pub fn trigger_date_time_millis(&self) -> i64 {
        self.trigger_time.timestamp_millis()
    }

    /// 已收到执行结果
    pub fn is_finished(&self) -> bool {
        self.handle_code > 0
    }

    /// 调度失败或执行失败
    pub fn is_failed(&self) -> bool {
        let trigger_ok = self.trigger_code == 0 || self.trigger_code == SUCCESS_CODE;
        let handle_ok = self.handle_code == 0 || self.handle_code == SUCCESS_CODE;
        !(trigger_ok && handle_ok)
    }
}

/// 执行器注册信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub registry_group: String,
    pub registry_key: String,
    pub registry_value: String,
    pub update_time: DateTime<Utc>,
}
