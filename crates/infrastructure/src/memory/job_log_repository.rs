use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{JobLog, JobLogRepository, ALARM_STATUS_DEFAULT, SUCCESS_CODE};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryJobLogRepository {
    logs: RwLock<BTreeMap<i64, JobLog>>,
    next_id: AtomicI64,
}

impl InMemoryJobLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按任务ID列出日志，按ID升序
    pub async fn find_by_job_id(&self, job_id: i64) -> Vec<JobLog> {
        self.logs
            .read()
            .await
            .values()
            .filter(|log| log.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.logs.read().await.len()
    }
}

#[async_trait]
impl JobLogRepository for InMemoryJobLogRepository {
    async fn create(&self, log: &JobLog) -> SchedulerResult<JobLog> {
        let mut saved = log.clone();
        saved.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.logs.write().await.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<JobLog>> {
        Ok(self.logs.read().await.get(&id).cloned())
    }

    async fn update_trigger_info(&self, log: &JobLog) -> SchedulerResult<()> {
        let mut logs = self.logs.write().await;
        let stored = logs
            .get_mut(&log.id)
            .ok_or(SchedulerError::JobLogNotFound { id: log.id })?;
        stored.trigger_time = log.trigger_time;
        stored.trigger_code = log.trigger_code;
        stored.trigger_msg = log.trigger_msg.clone();
        stored.executor_address = log.executor_address.clone();
        stored.executor_handler = log.executor_handler.clone();
        stored.executor_param = log.executor_param.clone();
        stored.executor_sharding_param = log.executor_sharding_param.clone();
        stored.executor_fail_retry_count = log.executor_fail_retry_count;
        Ok(())
    }

    async fn update_handle_info(&self, log: &JobLog) -> SchedulerResult<()> {
        let mut logs = self.logs.write().await;
        let stored = logs
            .get_mut(&log.id)
            .ok_or(SchedulerError::JobLogNotFound { id: log.id })?;
        stored.handle_time = log.handle_time;
        stored.handle_code = log.handle_code;
        stored.handle_msg = log.handle_msg.clone();
        Ok(())
    }

    async fn find_fail_log_ids(&self, limit: usize) -> SchedulerResult<Vec<i64>> {
        Ok(self
            .logs
            .read()
            .await
            .values()
            .filter(|log| log.alarm_status == ALARM_STATUS_DEFAULT && log.is_failed())
            .take(limit)
            .map(|log| log.id)
            .collect())
    }

    async fn update_alarm_status(
        &self,
        id: i64,
        old_status: i32,
        new_status: i32,
    ) -> SchedulerResult<bool> {
        let mut logs = self.logs.write().await;
        match logs.get_mut(&id) {
            Some(log) if log.alarm_status == old_status => {
                log.alarm_status = new_status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_lost_candidates(
        &self,
        triggered_before: DateTime<Utc>,
    ) -> SchedulerResult<Vec<JobLog>> {
        Ok(self
            .logs
            .read()
            .await
            .values()
            .filter(|log| {
                log.trigger_code == SUCCESS_CODE
                    && log.handle_code == 0
                    && log.trigger_time <= triggered_before
            })
            .cloned()
            .collect())
    }
}
