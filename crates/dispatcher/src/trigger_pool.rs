//! 触发线程池
//!
//! 触发请求异步执行，提交方不等待结果。池分为快慢两条通道：
//! 一分钟内超过10次耗时大于500ms的任务，在该分钟剩余时间内进入慢通道，
//! 避免慢任务占满快通道的并发。

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use taskmesh_core::{SchedulerError, SchedulerResult};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::trigger::{TriggerDispatcher, TriggerRequest};

const SLOW_THRESHOLD: Duration = Duration::from_millis(500);
const SLOW_COUNT_LIMIT: u32 = 10;

/// 异步提交触发请求
pub trait TriggerSubmitter: Send + Sync {
    fn submit(&self, request: TriggerRequest) -> SchedulerResult<()>;
}

pub struct JobTriggerPool {
    dispatcher: Arc<TriggerDispatcher>,
    inner: Arc<PoolInner>,
}

struct PoolInner {
    fast: Arc<Semaphore>,
    slow: Arc<Semaphore>,
    fast_max: u32,
    slow_max: u32,
    /// 当前统计窗口（分钟）
    minute: AtomicI64,
    slow_counts: DashMap<i64, AtomicU32>,
    closed: AtomicBool,
}

impl PoolInner {
    fn current_minute() -> i64 {
        chrono::Utc::now().timestamp() / 60
    }

    fn is_slow(&self, job_id: i64) -> bool {
        self.slow_counts
            .get(&job_id)
            .map(|count| count.load(Ordering::Relaxed) > SLOW_COUNT_LIMIT)
            .unwrap_or(false)
    }

    fn record_cost(&self, job_id: i64, cost: Duration) {
        let minute = Self::current_minute();
        let previous = self.minute.swap(minute, Ordering::AcqRel);
        if previous != minute {
            self.slow_counts.clear();
        }
        if cost > SLOW_THRESHOLD {
            self.slow_counts
                .entry(job_id)
                .or_insert_with(|| AtomicU32::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl JobTriggerPool {
    pub fn new(dispatcher: Arc<TriggerDispatcher>, fast_max: usize, slow_max: usize) -> Self {
        let fast_max = fast_max.max(1);
        let slow_max = slow_max.max(1);
        Self {
            dispatcher,
            inner: Arc::new(PoolInner {
                fast: Arc::new(Semaphore::new(fast_max)),
                slow: Arc::new(Semaphore::new(slow_max)),
                fast_max: fast_max as u32,
                slow_max: slow_max as u32,
                minute: AtomicI64::new(PoolInner::current_minute()),
                slow_counts: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_slow(&self, job_id: i64) -> bool {
        self.inner.is_slow(job_id)
    }

    /// 停止接收新请求并等待已提交的触发完成
    pub async fn shutdown(&self, timeout: Duration) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let inner = self.inner.clone();
        let wait_all = async move {
            let fast = inner.fast.acquire_many(inner.fast_max).await;
            let slow = inner.slow.acquire_many(inner.slow_max).await;
            drop((fast, slow));
        };
        match tokio::time::timeout(timeout, wait_all).await {
            Ok(()) => info!("触发线程池已关闭"),
            Err(_) => warn!("等待触发线程池关闭超时, 仍有触发请求未完成"),
        }
    }
}

impl TriggerSubmitter for JobTriggerPool {
    fn submit(&self, request: TriggerRequest) -> SchedulerResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Dispatch("触发线程池已关闭".to_string()));
        }

        let job_id = request.job_id;
        let slow = self.inner.is_slow(job_id);
        let semaphore = if slow {
            self.inner.slow.clone()
        } else {
            self.inner.fast.clone()
        };
        debug!("提交触发请求, jobId={}, 慢通道={}", job_id, slow);

        let dispatcher = self.dispatcher.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let start = Instant::now();
            dispatcher.trigger(request).await;
            inner.record_cost(job_id, start.elapsed());
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> PoolInner {
        PoolInner {
            fast: Arc::new(Semaphore::new(1)),
            slow: Arc::new(Semaphore::new(1)),
            fast_max: 1,
            slow_max: 1,
            minute: AtomicI64::new(PoolInner::current_minute()),
            slow_counts: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_job_becomes_slow_after_repeated_slow_triggers() {
        let inner = inner();
        for _ in 0..SLOW_COUNT_LIMIT {
            inner.record_cost(1, Duration::from_millis(600));
        }
        assert!(!inner.is_slow(1));
        inner.record_cost(1, Duration::from_millis(600));
        assert!(inner.is_slow(1));

        inner.record_cost(2, Duration::from_millis(10));
        assert!(!inner.is_slow(2));
    }

    #[test]
    fn test_slow_counts_reset_on_new_minute() {
        let inner = inner();
        for _ in 0..=SLOW_COUNT_LIMIT {
            inner.record_cost(1, Duration::from_millis(600));
        }
        assert!(inner.is_slow(1));
        inner.minute.store(0, Ordering::SeqCst);
        inner.record_cost(1, Duration::from_millis(1));
        assert!(!inner.is_slow(1));
    }
}
