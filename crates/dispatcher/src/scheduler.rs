//! 定时调度循环
//!
//! 每秒预读未来5秒内需要触发的任务：
//! - 已过期超过5秒的按调度过期策略处理
//! - 已到期的立即触发
//! - 尚未到期的放入时间轮，到点后触发
//!
//! 每个任务处理后都会推进下一次触发时间，首次出现 `trigger_next_time == 0`
//! 的任务只初始化触发时间，不触发。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{JobDefinition, JobRepository, MisfireStrategy, TriggerType};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::cron_utils::next_trigger_time;
use crate::trigger::TriggerRequest;
use crate::trigger_pool::TriggerSubmitter;

pub const PRE_READ_MS: i64 = 5000;

pub struct JobScheduler {
    jobs: Arc<dyn JobRepository>,
    trigger: Arc<dyn TriggerSubmitter>,
    /// 按触发秒（epoch 秒）分桶的待触发任务
    ring: Mutex<BTreeMap<i64, Vec<i64>>>,
}

impl JobScheduler {
    pub fn new(jobs: Arc<dyn JobRepository>, trigger: Arc<dyn TriggerSubmitter>) -> Self {
        Self {
            jobs,
            trigger,
            ring: Mutex::new(BTreeMap::new()),
        }
    }

    /// 预读并处理一轮，返回本轮涉及的任务数
    pub async fn pre_read_once(&self, now_ms: i64) -> SchedulerResult<usize> {
        let jobs = self.jobs.find_schedulable(now_ms + PRE_READ_MS).await?;
        let count = jobs.len();
        for job in jobs {
            if let Err(e) = self.schedule_job(job, now_ms).await {
                error!("调度任务异常: {}", e);
            }
        }
        Ok(count)
    }

    async fn schedule_job(&self, mut job: JobDefinition, now_ms: i64) -> SchedulerResult<()> {
        if job.trigger_next_time == 0 {
            debug!("初始化任务 {} 的下次触发时间", job.id);
            self.refresh_next_time(&mut job, now_ms);
            return self.save_schedule(&job).await;
        }

        if now_ms > job.trigger_next_time + PRE_READ_MS {
            warn!(
                "任务调度过期, jobId={}, 应触发时间={}",
                job.id, job.trigger_next_time
            );
            if job.misfire_strategy == MisfireStrategy::FireOnceNow {
                self.submit(job.id, TriggerType::Misfire);
            }
            self.refresh_next_time(&mut job, now_ms);
        } else if now_ms >= job.trigger_next_time {
            self.submit(job.id, TriggerType::Cron);
            self.refresh_next_time(&mut job, now_ms);

            // 下次触发仍在预读窗口内时直接放入时间轮
            if job.trigger_status && now_ms + PRE_READ_MS > job.trigger_next_time {
                self.push_ring(job.trigger_next_time, job.id).await;
                let from = job.trigger_next_time;
                self.refresh_next_time(&mut job, from);
            }
        } else {
            self.push_ring(job.trigger_next_time, job.id).await;
            let from = job.trigger_next_time;
            self.refresh_next_time(&mut job, from);
        }

        self.save_schedule(&job).await
    }

    fn refresh_next_time(&self, job: &mut JobDefinition, from_ms: i64) {
        match next_trigger_time(job, from_ms) {
            Ok(Some(next)) => {
                job.trigger_last_time = job.trigger_next_time;
                job.trigger_next_time = next;
            }
            Ok(None) => {
                warn!("任务 {} 没有下一次触发时间, 停止调度", job.id);
                Self::stop(job);
            }
            Err(e) => {
                error!("任务 {} 调度配置无效, 停止调度: {}", job.id, e);
                Self::stop(job);
            }
        }
    }

    fn stop(job: &mut JobDefinition) {
        job.trigger_status = false;
        job.trigger_last_time = 0;
        job.trigger_next_time = 0;
    }

    async fn save_schedule(&self, job: &JobDefinition) -> SchedulerResult<()> {
        self.jobs
            .update_schedule(
                job.id,
                job.trigger_last_time,
                job.trigger_next_time,
                job.trigger_status,
            )
            .await
    }

    async fn push_ring(&self, trigger_time_ms: i64, job_id: i64) {
        let second = trigger_time_ms.div_euclid(1000);
        debug!("任务 {} 放入时间轮, 秒={}", job_id, second);
        self.ring
            .lock()
            .await
            .entry(second)
            .or_default()
            .push(job_id);
    }

    /// 触发时间轮中所有已到期的任务，返回触发数量
    pub async fn drain_ring(&self, now_ms: i64) -> usize {
        let now_second = now_ms.div_euclid(1000);
        let due: Vec<i64> = {
            let mut ring = self.ring.lock().await;
            let pending = ring.split_off(&(now_second + 1));
            let due = std::mem::replace(&mut *ring, pending);
            due.into_values().flatten().collect()
        };
        for job_id in &due {
            self.submit(*job_id, TriggerType::Cron);
        }
        due.len()
    }

    pub async fn ring_size(&self) -> usize {
        self.ring.lock().await.values().map(Vec::len).sum()
    }

    fn submit(&self, job_id: i64, trigger_type: TriggerType) {
        if let Err(e) = self.trigger.submit(TriggerRequest::new(job_id, trigger_type)) {
            warn!("提交任务 {} 触发失败: {}", job_id, e);
        }
    }

    pub async fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("任务调度循环已启动");
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now_ms = Utc::now().timestamp_millis();
                    if let Err(e) = self.pre_read_once(now_ms).await {
                        error!("任务预读失败: {}", e);
                    }
                    self.drain_ring(Utc::now().timestamp_millis()).await;
                }
                _ = shutdown_rx.recv() => {
                    // 停止前触发时间轮中剩余的任务
                    let remaining = self.drain_ring(i64::MAX / 2).await;
                    info!("任务调度循环已停止, 退出前触发 {} 个任务", remaining);
                    break;
                }
            }
        }
    }
}
