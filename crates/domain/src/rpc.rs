//! 调度中心与执行器之间的RPC报文
//!
//! 所有请求与响应都以 JSON 传输，字段使用 camelCase。响应统一包装为
//! [`ReturnT`]：`code` 为 200 表示成功，500 表示失败，502 表示执行超时。

use serde::{Deserialize, Serialize};

use crate::value_objects::BlockStrategy;

pub const SUCCESS_CODE: i32 = 200;
pub const FAIL_CODE: i32 = 500;
pub const TIMEOUT_CODE: i32 = 502;

/// 访问令牌请求头
pub const ACCESS_TOKEN_HEADER: &str = "TASKMESH-ACCESS-TOKEN";

/// RPC 响应信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnT<T = String> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<T>,
}

impl<T> ReturnT<T> {
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: None,
            content: None,
        }
    }

    pub fn success_with(content: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: None,
            content: Some(content),
        }
    }

    pub fn success_msg(msg: impl Into<String>) -> Self {
        Self::with_code(SUCCESS_CODE, msg)
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::with_code(FAIL_CODE, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::with_code(TIMEOUT_CODE, msg)
    }

    pub fn with_code(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: Some(msg.into()),
            content: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn msg_or_empty(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }
}

/// 调度中心发往执行器的触发参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerParam {
    pub job_id: i64,
    pub executor_handler: String,
    #[serde(default)]
    pub executor_params: Option<String>,
    #[serde(default)]
    pub executor_block_strategy: BlockStrategy,
    /// 超时时间（秒），0 表示不限制
    #[serde(default)]
    pub executor_timeout: i32,
    pub log_id: i64,
    /// 触发时间（毫秒时间戳），用于定位日志文件
    pub log_date_time: i64,
    pub glue_type: String,
    #[serde(default)]
    pub glue_source: Option<String>,
    #[serde(default)]
    pub glue_updatetime: i64,
    #[serde(default)]
    pub broadcast_index: i32,
    #[serde(default = "default_broadcast_total")]
    pub broadcast_total: i32,
}

fn default_broadcast_total() -> i32 {
    1
}

/// 执行器回调的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleCallbackParam {
    pub log_id: i64,
    #[serde(rename = "logDateTim", alias = "logDateTime")]
    pub log_date_time: i64,
    pub handle_code: i32,
    #[serde(default)]
    pub handle_msg: Option<String>,
}

impl HandleCallbackParam {
    pub fn new(log_id: i64, log_date_time: i64, handle_code: i32, handle_msg: Option<String>) -> Self {
        Self {
            log_id,
            log_date_time,
            handle_code,
            handle_msg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryParam {
    pub registry_group: String,
    pub registry_key: String,
    pub registry_value: String,
}

impl RegistryParam {
    pub fn new(
        registry_group: impl Into<String>,
        registry_key: impl Into<String>,
        registry_value: impl Into<String>,
    ) -> Self {
        Self {
            registry_group: registry_group.into(),
            registry_key: registry_key.into(),
            registry_value: registry_value.into(),
        }
    }

    pub fn has_empty_field(&self) -> bool {
        self.registry_group.trim().is_empty()
            || self.registry_key.trim().is_empty()
            || self.registry_value.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleBeatParam {
    pub job_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillParam {
    pub job_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogParam {
    #[serde(rename = "logDateTim", alias = "logDateTime")]
    pub log_date_time: i64,
    pub log_id: i64,
    pub from_line_num: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResult {
    pub from_line_num: usize,
    pub to_line_num: usize,
    pub log_content: String,
    pub is_end: bool,
}
