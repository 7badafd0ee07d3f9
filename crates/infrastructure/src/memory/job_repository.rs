use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{JobDefinition, JobRepository};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<i64, JobDefinition>>,
    next_id: AtomicI64,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn save(&self, job: &JobDefinition) -> SchedulerResult<JobDefinition> {
        let mut jobs = self.jobs.write().await;
        let mut saved = job.clone();
        if saved.id <= 0 {
            saved.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        }
        // 显式指定的ID不能与自增ID冲突
        self.next_id.fetch_max(saved.id, Ordering::SeqCst);
        jobs.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_schedulable(&self, max_next_time: i64) -> SchedulerResult<Vec<JobDefinition>> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.trigger_status && job.trigger_next_time <= max_next_time)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.trigger_next_time);
        Ok(jobs)
    }

    async fn update_schedule(
        &self,
        id: i64,
        trigger_last_time: i64,
        trigger_next_time: i64,
        trigger_status: bool,
    ) -> SchedulerResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound { id })?;
        job.trigger_last_time = trigger_last_time;
        job.trigger_next_time = trigger_next_time;
        job.trigger_status = trigger_status;
        Ok(())
    }
}
