//! 单个任务的工作线程
//!
//! 每个任务ID对应一个常驻的 tokio 任务，按 FIFO 顺序串行执行触发请求。
//! 每个出队的触发请求恰好产生一次回调：正常完成、超时或被终止。

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::FutureExt;
use taskmesh_core::text::{truncate_with_ellipsis, MAX_CALLBACK_MSG_CHARS};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{
    GlueType, HandleCallbackParam, ReturnT, TriggerParam, FAIL_CODE, TIMEOUT_CODE,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::callback::CallbackSink;
use crate::context::{HandleOutcome, JobContext};
use crate::handler::JobHandler;
use crate::log_file::JobFileAppender;
use crate::worker_registry::WorkerRegistry;

pub const IDLE_STOP_REASON: &str = "excutor idel times over limit.";

/// 处理器标识，用于判断任务的处理器是否发生变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKey {
    Bean(String),
    Glue(GlueType, i64),
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_wait: Duration,
    pub idle_limit: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_wait: Duration::from_secs(3),
            idle_limit: 30,
        }
    }
}

#[derive(Default)]
struct TriggerQueue {
    items: VecDeque<TriggerParam>,
    log_ids: HashSet<i64>,
}

pub struct JobWorker {
    job_id: i64,
    handler: Arc<dyn JobHandler>,
    handler_key: HandlerKey,
    queue: Mutex<TriggerQueue>,
    notify: Notify,
    running: AtomicBool,
    stop_reason: Mutex<Option<String>>,
    stop_token: CancellationToken,
    callback: Arc<dyn CallbackSink>,
    appender: Arc<JobFileAppender>,
    settings: WorkerSettings,
}

enum AttemptResult {
    Finished(SchedulerResult<()>),
    Panicked(String),
    TimedOut,
    /// 等待期间任务线程被终止
    Interrupted,
}

impl JobWorker {
    pub fn new(
        job_id: i64,
        handler: Arc<dyn JobHandler>,
        handler_key: HandlerKey,
        callback: Arc<dyn CallbackSink>,
        appender: Arc<JobFileAppender>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            job_id,
            handler,
            handler_key,
            queue: Mutex::new(TriggerQueue::default()),
            notify: Notify::new(),
            running: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            stop_token: CancellationToken::new(),
            callback,
            appender,
            settings,
        }
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn handler(&self) -> Arc<dyn JobHandler> {
        self.handler.clone()
    }

    pub fn handler_key(&self) -> &HandlerKey {
        &self.handler_key
    }

    fn lock_queue(&self) -> MutexGuard<'_, TriggerQueue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 加入触发队列，同一个调度日志ID在队列中只能出现一次
    pub fn push(&self, param: TriggerParam) -> ReturnT<String> {
        let mut queue = self.lock_queue();
        if !queue.log_ids.insert(param.log_id) {
            info!("重复的触发请求, jobId={}, logId={}", self.job_id, param.log_id);
            return ReturnT::fail(format!("repeate trigger job, logId:{}", param.log_id));
        }
        queue.items.push_back(param);
        drop(queue);
        self.notify.notify_one();
        ReturnT::success()
    }

    pub fn queue_len(&self) -> usize {
        self.lock_queue().items.len()
    }

    /// 正在执行或队列中仍有待执行的请求
    pub fn is_running_or_has_queue(&self) -> bool {
        let queue = self.lock_queue();
        self.running.load(Ordering::SeqCst) || !queue.items.is_empty()
    }

    fn try_pop(&self) -> Option<TriggerParam> {
        let mut queue = self.lock_queue();
        let param = queue.items.pop_front()?;
        queue.log_ids.remove(&param.log_id);
        self.running.store(true, Ordering::SeqCst);
        Some(param)
    }

    /// 标记停止，只发送信号，不中断正在执行的处理器
    pub fn stop(&self, reason: &str) {
        {
            let mut stop_reason = self
                .stop_reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if stop_reason.is_none() {
                *stop_reason = Some(reason.to_string());
            }
        }
        self.stop_token.cancel();
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    pub fn stop_reason(&self) -> String {
        self.stop_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_default()
    }

    async fn poll(&self) -> Option<TriggerParam> {
        let deadline = tokio::time::Instant::now() + self.settings.poll_wait;
        loop {
            if let Some(param) = self.try_pop() {
                return Some(param);
            }
            if self.is_stopped() {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.stop_token.cancelled() => return None,
                _ = tokio::time::sleep_until(deadline) => return self.try_pop(),
            }
        }
    }

    /// 工作线程主循环，由 [`WorkerRegistry`] 启动
    pub(crate) async fn run(self: Arc<Self>, registry: Weak<WorkerRegistry>) {
        if let Err(e) = self.handler.init().await {
            error!("任务处理器初始化失败, jobId={}: {}", self.job_id, e);
        }

        let mut idle_times: u32 = 0;
        while !self.is_stopped() {
            idle_times += 1;
            match self.poll().await {
                Some(param) => {
                    idle_times = 0;
                    self.execute(param).await;
                    self.running.store(false, Ordering::SeqCst);
                }
                None => {
                    if idle_times > self.settings.idle_limit {
                        let evicted = registry
                            .upgrade()
                            .map(|registry| registry.evict_idle(&self))
                            .unwrap_or(true);
                        if evicted {
                            self.stop(IDLE_STOP_REASON);
                        }
                    }
                }
            }
        }

        self.drain().await;
        if let Err(e) = self.handler.destroy().await {
            error!("任务处理器销毁失败, jobId={}: {}", self.job_id, e);
        }
        debug!("任务线程退出, jobId={}, 原因={}", self.job_id, self.stop_reason());
    }

    /// 队列中尚未执行的请求全部以失败回调
    async fn drain(&self) {
        let pending: Vec<_> = {
            let mut queue = self.lock_queue();
            queue.log_ids.clear();
            queue.items.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }
        let msg = format!(
            "{} [job not executed, in the job queue, killed.]",
            self.stop_reason()
        );
        warn!("任务 {} 队列中 {} 个请求未执行", self.job_id, pending.len());
        for param in pending {
            self.callback.push(HandleCallbackParam::new(
                param.log_id,
                param.log_date_time,
                FAIL_CODE,
                Some(msg.clone()),
            ));
        }
    }

    async fn execute(&self, param: TriggerParam) {
        let ctx = JobContext::new(&param, self.appender.clone(), self.stop_token.child_token());
        ctx.log(format!(
            "----------- taskmesh job execute start -----------\n----------- Param:{}",
            param.executor_params.as_deref().unwrap_or("")
        ))
        .await;

        let result = if param.executor_timeout > 0 {
            self.execute_with_timeout(&ctx, param.executor_timeout as u64)
                .await
        } else {
            match AssertUnwindSafe(self.handler.execute(&ctx))
                .catch_unwind()
                .await
            {
                Ok(result) => AttemptResult::Finished(result),
                Err(panic) => AttemptResult::Panicked(panic_message(panic.as_ref())),
            }
        };

        let outcome = match result {
            AttemptResult::Finished(Ok(())) => ctx.outcome().unwrap_or(HandleOutcome {
                code: FAIL_CODE,
                msg: Some("job handle result lost.".to_string()),
            }),
            AttemptResult::Finished(Err(e)) => HandleOutcome {
                code: FAIL_CODE,
                msg: Some(e.to_string()),
            },
            AttemptResult::Panicked(msg) => HandleOutcome {
                code: FAIL_CODE,
                msg: Some(msg),
            },
            AttemptResult::Interrupted => HandleOutcome {
                code: FAIL_CODE,
                msg: Some(format!("{} [job running, killed]", self.stop_reason())),
            },
            AttemptResult::TimedOut => {
                ctx.log("----------- taskmesh job execute timeout").await;
                ctx.cancel();
                ctx.handle_timeout("job execute timeout ");
                HandleOutcome {
                    code: TIMEOUT_CODE,
                    msg: Some("job execute timeout ".to_string()),
                }
            }
        };
        let msg = outcome
            .msg
            .as_deref()
            .map(|m| truncate_with_ellipsis(m, MAX_CALLBACK_MSG_CHARS));

        ctx.log(format!(
            "----------- taskmesh job execute end(finish) -----------\n----------- Result: handleCode={}, handleMsg = {}",
            outcome.code,
            msg.as_deref().unwrap_or("")
        ))
        .await;

        let callback = if self.is_stopped() {
            HandleCallbackParam::new(
                param.log_id,
                param.log_date_time,
                FAIL_CODE,
                Some(format!("{} [job running, killed]", self.stop_reason())),
            )
        } else {
            HandleCallbackParam::new(param.log_id, param.log_date_time, outcome.code, msg)
        };
        metrics::counter!(
            "taskmesh_job_execute_total",
            "code" => callback.handle_code.to_string()
        )
        .increment(1);
        self.callback.push(callback);
    }

    /// 在独立任务中执行，超时或线程被终止时只发送取消信号，不中断该任务
    async fn execute_with_timeout(&self, ctx: &JobContext, timeout_seconds: u64) -> AttemptResult {
        let handler = self.handler.clone();
        let task_ctx = ctx.clone();
        let task = tokio::spawn(async move { handler.execute(&task_ctx).await });

        let waited = tokio::select! {
            waited = tokio::time::timeout(Duration::from_secs(timeout_seconds), task) => waited,
            _ = self.stop_token.cancelled() => {
                info!(
                    "任务线程已终止, 不再等待执行结果, jobId={}, logId={}",
                    self.job_id,
                    ctx.log_id()
                );
                return AttemptResult::Interrupted;
            }
        };

        match waited {
            Ok(Ok(result)) => AttemptResult::Finished(result),
            Ok(Err(join_error)) if join_error.is_panic() => {
                AttemptResult::Panicked(panic_message(join_error.into_panic().as_ref()))
            }
            Ok(Err(join_error)) => AttemptResult::Panicked(join_error.to_string()),
            Err(_) => {
                warn!(
                    "任务执行超时, jobId={}, logId={}, timeout={}s",
                    self.job_id,
                    ctx.log_id(),
                    timeout_seconds
                );
                AttemptResult::TimedOut
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("job handler panicked: {detail}")
}
