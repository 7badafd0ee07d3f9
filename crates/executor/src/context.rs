use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use taskmesh_domain::{TriggerParam, FAIL_CODE, SUCCESS_CODE, TIMEOUT_CODE};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::log_file::JobFileAppender;

/// 处理器设置的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleOutcome {
    pub code: i32,
    pub msg: Option<String>,
}

/// 单次调度的执行上下文
///
/// 克隆开销很小，所有克隆共享同一个结果槽与取消信号。
#[derive(Clone)]
pub struct JobContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    job_id: i64,
    job_param: Option<String>,
    log_id: i64,
    log_date_time: i64,
    shard_index: i32,
    shard_total: i32,
    log_file: PathBuf,
    appender: Arc<JobFileAppender>,
    outcome: Mutex<Option<HandleOutcome>>,
    cancel: CancellationToken,
}

impl JobContext {
    pub fn new(
        param: &TriggerParam,
        appender: Arc<JobFileAppender>,
        cancel: CancellationToken,
    ) -> Self {
        let log_file = appender.make_log_file_name(param.log_date_time, param.log_id);
        Self {
            inner: Arc::new(ContextInner {
                job_id: param.job_id,
                job_param: param.executor_params.clone(),
                log_id: param.log_id,
                log_date_time: param.log_date_time,
                shard_index: param.broadcast_index,
                shard_total: param.broadcast_total,
                log_file,
                appender,
                outcome: Mutex::new(None),
                cancel,
            }),
        }
    }

    pub fn job_id(&self) -> i64 {
        self.inner.job_id
    }

    pub fn job_param(&self) -> Option<&str> {
        self.inner.job_param.as_deref()
    }

    pub fn log_id(&self) -> i64 {
        self.inner.log_id
    }

    pub fn log_date_time(&self) -> i64 {
        self.inner.log_date_time
    }

    pub fn shard_index(&self) -> i32 {
        self.inner.shard_index
    }

    pub fn shard_total(&self) -> i32 {
        self.inner.shard_total
    }

    pub fn log_file_name(&self) -> &Path {
        &self.inner.log_file
    }

    /// 写入本次调度的日志文件，写入失败只记录系统日志
    pub async fn log(&self, message: impl AsRef<str>) {
        if let Err(e) = self
            .inner
            .appender
            .append(&self.inner.log_file, message.as_ref())
            .await
        {
            warn!("写入任务日志失败 {:?}: {}", self.inner.log_file, e);
        }
    }

    pub fn handle_success(&self) -> bool {
        self.handle_result(SUCCESS_CODE, None)
    }

    pub fn handle_success_msg(&self, msg: impl Into<String>) -> bool {
        self.handle_result(SUCCESS_CODE, Some(msg.into()))
    }

    pub fn handle_fail(&self, msg: impl Into<String>) -> bool {
        self.handle_result(FAIL_CODE, Some(msg.into()))
    }

    pub fn handle_timeout(&self, msg: impl Into<String>) -> bool {
        self.handle_result(TIMEOUT_CODE, Some(msg.into()))
    }

    /// 设置执行结果，后设置的覆盖先设置的
    pub fn handle_result(&self, code: i32, msg: Option<String>) -> bool {
        let mut outcome = self
            .inner
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *outcome = Some(HandleOutcome { code, msg });
        true
    }

    pub fn outcome(&self) -> Option<HandleOutcome> {
        self.inner
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 任务被终止或执行超时后为 true，长任务应定期检查并尽快退出
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_testing_utils::TriggerParamBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_context_outcome_and_cancel() {
        let dir = TempDir::new().unwrap();
        let param = TriggerParamBuilder::new(3, 30)
            .with_params("p1")
            .with_shard(1, 4)
            .build();
        let ctx = JobContext::new(
            &param,
            Arc::new(JobFileAppender::new(dir.path())),
            CancellationToken::new(),
        );

        assert_eq!(ctx.job_param(), Some("p1"));
        assert_eq!((ctx.shard_index(), ctx.shard_total()), (1, 4));
        assert!(ctx.outcome().is_none());

        let clone = ctx.clone();
        clone.handle_fail("bad");
        assert_eq!(ctx.outcome().unwrap().code, FAIL_CODE);

        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());

        ctx.log("hello").await;
        let content = std::fs::read_to_string(ctx.log_file_name()).unwrap();
        assert!(content.contains("hello"));
    }
}
