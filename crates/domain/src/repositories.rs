//! 领域仓储抽象
//!
//! 调度中心的持久化只通过这些接口访问，具体存储由基础设施层提供。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskmesh_core::SchedulerResult;

use crate::entities::{ExecutorGroup, JobDefinition, JobLog, RegistryEntry};

/// 任务定义仓储
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>>;
    async fn find_all(&self) -> SchedulerResult<Vec<JobDefinition>>;
    /// id 为 0 时分配新ID
    async fn save(&self, job: &JobDefinition) -> SchedulerResult<JobDefinition>;
    /// 启用中且下次触发时间不晚于 `max_next_time` 的任务
    async fn find_schedulable(&self, max_next_time: i64) -> SchedulerResult<Vec<JobDefinition>>;
    async fn update_schedule(
        &self,
        id: i64,
        trigger_last_time: i64,
        trigger_next_time: i64,
        trigger_status: bool,
    ) -> SchedulerResult<()>;
}

/// 执行器分组仓储
#[async_trait]
pub trait ExecutorGroupRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutorGroup>>;
    async fn find_all(&self) -> SchedulerResult<Vec<ExecutorGroup>>;
    async fn save(&self, group: &ExecutorGroup) -> SchedulerResult<ExecutorGroup>;
    async fn update_address_list(&self, id: i64, address_list: Option<String>)
        -> SchedulerResult<()>;
}

/// 调度日志仓储
#[async_trait]
pub trait JobLogRepository: Send + Sync {
    /// 保存新日志并返回分配了ID的记录
    async fn create(&self, log: &JobLog) -> SchedulerResult<JobLog>;
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<JobLog>>;
    async fn update_trigger_info(&self, log: &JobLog) -> SchedulerResult<()>;
    async fn update_handle_info(&self, log: &JobLog) -> SchedulerResult<()>;
    /// 告警状态为初始值的失败日志
    async fn find_fail_log_ids(&self, limit: usize) -> SchedulerResult<Vec<i64>>;
    /// CAS 更新告警状态，返回是否更新成功
    async fn update_alarm_status(&self, id: i64, old_status: i32, new_status: i32)
        -> SchedulerResult<bool>;
    /// 调度成功但在 `triggered_before` 之前仍未收到结果的日志
    async fn find_lost_candidates(
        &self,
        triggered_before: DateTime<Utc>,
    ) -> SchedulerResult<Vec<JobLog>>;
}

/// 执行器注册表仓储
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    /// 存在则刷新更新时间，否则新增
    async fn upsert(&self, group: &str, key: &str, value: &str, now: DateTime<Utc>)
        -> SchedulerResult<()>;
    async fn remove(&self, group: &str, key: &str, value: &str) -> SchedulerResult<bool>;
    async fn find_all(&self) -> SchedulerResult<Vec<RegistryEntry>>;
    /// 删除 `updated_before` 之前未更新的注册信息，返回删除数量
    async fn remove_dead(&self, updated_before: DateTime<Utc>) -> SchedulerResult<usize>;
}
