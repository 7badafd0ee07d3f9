use thiserror::Error;

/// 调度平台错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("路由失败: {0}")]
    Route(String),

    #[error("调度请求失败: {0}")]
    Dispatch(String),

    #[error("任务执行错误: {0}")]
    Execution(String),

    #[error("任务执行超时")]
    ExecutionTimeout,

    #[error("回调失败: {0}")]
    Callback(String),

    #[error("任务未找到: {id}")]
    JobNotFound { id: i64 },

    #[error("执行器分组未找到: {id}")]
    GroupNotFound { id: i64 },

    #[error("调度日志未找到: {id}")]
    JobLogNotFound { id: i64 },

    #[error("任务处理器未找到: {name}")]
    HandlerNotFound { name: String },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl SchedulerError {
    /// 可以在下一个周期重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Network(_)
                | SchedulerError::Dispatch(_)
                | SchedulerError::Callback(_)
                | SchedulerError::ExecutionTimeout
                | SchedulerError::Io(_)
        )
    }
}
