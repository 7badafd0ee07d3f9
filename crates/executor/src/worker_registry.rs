use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use taskmesh_domain::{BlockStrategy, ReturnT, TriggerParam};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::callback::CallbackSink;
use crate::handler::JobHandler;
use crate::job_worker::{HandlerKey, JobWorker, WorkerSettings};
use crate::log_file::JobFileAppender;

pub const CHANGE_HANDLER_REASON: &str =
    "change jobhandler or glue type, and terminate the old job thread.";
pub const DISCARD_LATER_MSG: &str = "block strategy effect：Discard Later";
pub const COVER_EARLY_REASON: &str = "block strategy effect：Cover Early";
pub const KILL_REASON: &str = "scheduling center kill job.";
pub const SHUTDOWN_REASON: &str = "web container destroy and kill the job.";

struct WorkerSlot {
    worker: Arc<JobWorker>,
    handle: JoinHandle<()>,
}

/// 已解析的处理器，以及它对应的标识
pub struct ResolvedHandler {
    pub handler: Arc<dyn JobHandler>,
    pub key: HandlerKey,
}

/// 任务ID到工作线程的映射
///
/// 创建、替换、空闲回收与入队都在同一个任务ID的 entry 锁内完成，
/// 并发触发会收敛到同一个工作线程，入队也不会落到正在回收的线程上。
pub struct WorkerRegistry {
    me: Weak<WorkerRegistry>,
    workers: DashMap<i64, WorkerSlot>,
    /// 被替换或终止的线程，关闭时等待它们退出
    retired: Mutex<Vec<JoinHandle<()>>>,
    callback: Arc<dyn CallbackSink>,
    appender: Arc<JobFileAppender>,
    settings: WorkerSettings,
}

impl WorkerRegistry {
    pub fn new(
        callback: Arc<dyn CallbackSink>,
        appender: Arc<JobFileAppender>,
        settings: WorkerSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            workers: DashMap::new(),
            retired: Mutex::new(Vec::new()),
            callback,
            appender,
            settings,
        })
    }

    pub fn get(&self, job_id: i64) -> Option<Arc<JobWorker>> {
        self.workers.get(&job_id).map(|slot| slot.worker.clone())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    fn spawn_worker(&self, job_id: i64, resolved: ResolvedHandler) -> WorkerSlot {
        let worker = Arc::new(JobWorker::new(
            job_id,
            resolved.handler,
            resolved.key,
            self.callback.clone(),
            self.appender.clone(),
            self.settings.clone(),
        ));
        let handle = tokio::spawn(worker.clone().run(self.me.clone()));
        info!("创建任务线程, jobId={}", job_id);
        WorkerSlot { worker, handle }
    }

    fn retire(&self, slot: WorkerSlot, reason: &str) {
        info!("终止任务线程, jobId={}, 原因={}", slot.worker.job_id(), reason);
        slot.worker.stop(reason);
        let mut retired = self.retired.lock().unwrap_or_else(|p| p.into_inner());
        retired.retain(|handle| !handle.is_finished());
        retired.push(slot.handle);
    }

    /// 按阻塞策略把触发请求交给任务线程，必要时创建或替换线程
    ///
    /// `resolve` 只在需要新处理器时调用；已有线程的处理器标识与 `key` 相同时沿用原处理器。
    pub fn dispatch<F>(
        &self,
        param: TriggerParam,
        key: HandlerKey,
        resolve: F,
    ) -> ReturnT<String>
    where
        F: FnOnce() -> Result<Arc<dyn JobHandler>, ReturnT<String>>,
    {
        let job_id = param.job_id;
        match self.workers.entry(job_id) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get().worker.clone();
                let replace_reason = if existing.handler_key() != &key {
                    Some(CHANGE_HANDLER_REASON)
                } else if existing.is_running_or_has_queue() {
                    match param.executor_block_strategy {
                        BlockStrategy::DiscardLater => {
                            return ReturnT::fail(DISCARD_LATER_MSG);
                        }
                        BlockStrategy::CoverEarly => Some(COVER_EARLY_REASON),
                        BlockStrategy::SerialExecution => None,
                    }
                } else {
                    None
                };

                match replace_reason {
                    None => existing.push(param),
                    Some(reason) => {
                        let handler = if existing.handler_key() == &key {
                            existing.handler()
                        } else {
                            match resolve() {
                                Ok(handler) => handler,
                                Err(fail) => return fail,
                            }
                        };
                        existing.stop(reason);
                        let slot = self.spawn_worker(job_id, ResolvedHandler { handler, key });
                        let result = slot.worker.push(param);
                        let old = std::mem::replace(entry.get_mut(), slot);
                        self.retire(old, reason);
                        result
                    }
                }
            }
            Entry::Vacant(entry) => {
                let handler = match resolve() {
                    Ok(handler) => handler,
                    Err(fail) => return fail,
                };
                let slot = self.spawn_worker(job_id, ResolvedHandler { handler, key });
                let result = slot.worker.push(param);
                entry.insert(slot);
                result
            }
        }
    }

    /// 终止并移除任务线程，返回是否存在
    pub fn remove(&self, job_id: i64, reason: &str) -> bool {
        match self.workers.remove(&job_id) {
            Some((_, slot)) => {
                self.retire(slot, reason);
                true
            }
            None => false,
        }
    }

    /// 空闲线程自行回收：仍是当前线程且队列为空时才移除
    pub(crate) fn evict_idle(&self, worker: &Arc<JobWorker>) -> bool {
        let removed = self.workers.remove_if(&worker.job_id(), |_, slot| {
            Arc::ptr_eq(&slot.worker, worker) && worker.queue_len() == 0
        });
        match removed {
            Some(_) => {
                info!("任务线程空闲超限, 回收 jobId={}", worker.job_id());
                true
            }
            None => !self
                .workers
                .get(&worker.job_id())
                .map(|slot| Arc::ptr_eq(&slot.worker, worker))
                .unwrap_or(false),
        }
    }

    /// 终止所有任务线程并等待退出
    pub async fn shutdown(&self, timeout: Duration) {
        let job_ids: Vec<i64> = self.workers.iter().map(|entry| *entry.key()).collect();
        for job_id in job_ids {
            self.remove(job_id, SHUTDOWN_REASON);
        }

        let handles: Vec<_> = self
            .retired
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        let wait_all = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            warn!("等待任务线程退出超时, 仍有处理器在执行");
        } else {
            info!("所有任务线程已退出");
        }
    }
}
