//! 调度日志的后台巡检：失败重试与结果丢失处理

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskmesh_core::text::{truncate_chars, MAX_HANDLE_MSG_CHARS};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{
    JobLogRepository, JobRepository, TriggerType, ALARM_STATUS_DEFAULT, ALARM_STATUS_LOCKED,
    ALARM_STATUS_PROCESSED, FAIL_CODE,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::completion::CompletionHandler;
use crate::registry_monitor::RegistryMonitor;
use crate::trigger::TriggerRequest;
use crate::trigger_pool::TriggerSubmitter;

const FAIL_SCAN_LIMIT: usize = 1000;

pub const RETRY_MARK: &str = "\n\n>>>>>>>>>>>失败重试<<<<<<<<<<<\n";

/// 失败任务巡检：按剩余重试次数重新触发
pub struct JobFailMonitor {
    jobs: Arc<dyn JobRepository>,
    logs: Arc<dyn JobLogRepository>,
    trigger: Arc<dyn TriggerSubmitter>,
    interval: Duration,
}

impl JobFailMonitor {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        logs: Arc<dyn JobLogRepository>,
        trigger: Arc<dyn TriggerSubmitter>,
        interval: Duration,
    ) -> Self {
        Self {
            jobs,
            logs,
            trigger,
            interval,
        }
    }

    /// 处理一轮失败日志，返回本轮处理的数量
    pub async fn scan_once(&self) -> SchedulerResult<usize> {
        let fail_ids = self.logs.find_fail_log_ids(FAIL_SCAN_LIMIT).await?;
        let mut processed = 0;

        for log_id in fail_ids {
            // 加锁，并发巡检时只有一个实例处理
            if !self
                .logs
                .update_alarm_status(log_id, ALARM_STATUS_DEFAULT, ALARM_STATUS_LOCKED)
                .await?
            {
                continue;
            }
            let Some(mut log) = self.logs.find_by_id(log_id).await? else {
                continue;
            };

            let job_exists = self.jobs.find_by_id(log.job_id).await?.is_some();
            if !job_exists {
                warn!("失败日志对应的任务已不存在, jobId={}", log.job_id);
            } else if log.executor_fail_retry_count > 0 {
                let retry_count = log.executor_fail_retry_count - 1;
                let request = TriggerRequest::new(log.job_id, TriggerType::Retry)
                    .with_fail_retry_count(retry_count)
                    .with_sharding_param(log.executor_sharding_param.clone())
                    .with_executor_param(log.executor_param.clone());

                let mut retry_msg = String::from(RETRY_MARK);
                match self.trigger.submit(request) {
                    Ok(()) => info!(
                        "失败任务重试, jobId={}, logId={}, 剩余重试次数={}",
                        log.job_id, log.id, retry_count
                    ),
                    Err(e) => {
                        warn!("失败任务重试提交失败, logId={}: {}", log.id, e);
                        retry_msg.push_str(&e.to_string());
                    }
                }

                let mut trigger_msg = log.trigger_msg.take().unwrap_or_default();
                trigger_msg.push_str(&retry_msg);
                log.trigger_msg = Some(truncate_chars(&trigger_msg, MAX_HANDLE_MSG_CHARS));
                self.logs.update_trigger_info(&log).await?;
            }

            self.logs
                .update_alarm_status(log_id, ALARM_STATUS_LOCKED, ALARM_STATUS_PROCESSED)
                .await?;
            processed += 1;
        }
        Ok(processed)
    }

    pub async fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("失败任务监控已启动, 周期: {:?}", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_once().await {
                        error!("失败任务监控异常: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("失败任务监控已停止");
                    break;
                }
            }
        }
    }
}

/// 结果丢失巡检：调度成功但长时间无回调、且执行器已下线的日志标记为失败
pub struct LostResultMonitor {
    logs: Arc<dyn JobLogRepository>,
    completion: Arc<CompletionHandler>,
    registry_monitor: Arc<RegistryMonitor>,
    lost_after: Duration,
    interval: Duration,
}

impl LostResultMonitor {
    pub fn new(
        logs: Arc<dyn JobLogRepository>,
        completion: Arc<CompletionHandler>,
        registry_monitor: Arc<RegistryMonitor>,
        lost_after: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            logs,
            completion,
            registry_monitor,
            lost_after,
            interval,
        }
    }

    pub async fn scan_once(&self) -> SchedulerResult<usize> {
        let lost_after = chrono::Duration::from_std(self.lost_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        let candidates = self
            .logs
            .find_lost_candidates(Utc::now() - lost_after)
            .await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let live = self.registry_monitor.live_addresses().await?;
        let mut marked = 0;
        for mut log in candidates {
            let online = log
                .executor_address
                .as_ref()
                .map(|address| live.contains(address))
                .unwrap_or(false);
            if online {
                continue;
            }

            log.handle_time = Some(Utc::now());
            log.handle_code = FAIL_CODE;
            log.handle_msg = Some("任务结果丢失，标记失败".to_string());
            warn!("任务结果丢失, logId={}, jobId={}", log.id, log.job_id);
            self.completion.update_handle_info_and_finish(log).await?;
            marked += 1;
        }
        Ok(marked)
    }

    pub async fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("任务结果丢失监控已启动, 周期: {:?}", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_once().await {
                        error!("任务结果丢失监控异常: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("任务结果丢失监控已停止");
                    break;
                }
            }
        }
    }
}
