use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{ExecutorGroup, ExecutorGroupRepository};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryExecutorGroupRepository {
    groups: RwLock<HashMap<i64, ExecutorGroup>>,
    next_id: AtomicI64,
}

impl InMemoryExecutorGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutorGroupRepository for InMemoryExecutorGroupRepository {
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutorGroup>> {
        Ok(self.groups.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<ExecutorGroup>> {
        let mut groups: Vec<_> = self.groups.read().await.values().cloned().collect();
        groups.sort_by_key(|group| group.id);
        Ok(groups)
    }

    async fn save(&self, group: &ExecutorGroup) -> SchedulerResult<ExecutorGroup> {
        let mut groups = self.groups.write().await;
        let mut saved = group.clone();
        if saved.id <= 0 {
            saved.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        }
        self.next_id.fetch_max(saved.id, Ordering::SeqCst);
        saved.update_time = Utc::now();
        groups.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_address_list(
        &self,
        id: i64,
        address_list: Option<String>,
    ) -> SchedulerResult<()> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&id)
            .ok_or(SchedulerError::GroupNotFound { id })?;
        group.address_list = address_list;
        group.update_time = Utc::now();
        Ok(())
    }
}
