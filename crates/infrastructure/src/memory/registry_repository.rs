use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{RegistryEntry, RegistryRepository};
use tokio::sync::RwLock;

type RegistryKey = (String, String, String);

#[derive(Debug, Default)]
pub struct InMemoryRegistryRepository {
    entries: RwLock<HashMap<RegistryKey, RegistryEntry>>,
}

impl InMemoryRegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryRepository for InMemoryRegistryRepository {
    async fn upsert(
        &self,
        group: &str,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        let registry_key = (group.to_string(), key.to_string(), value.to_string());
        self.entries
            .write()
            .await
            .entry(registry_key)
            .and_modify(|entry| entry.update_time = now)
            .or_insert_with(|| RegistryEntry {
                registry_group: group.to_string(),
                registry_key: key.to_string(),
                registry_value: value.to_string(),
                update_time: now,
            });
        Ok(())
    }

    async fn remove(&self, group: &str, key: &str, value: &str) -> SchedulerResult<bool> {
        let registry_key = (group.to_string(), key.to_string(), value.to_string());
        Ok(self.entries.write().await.remove(&registry_key).is_some())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<RegistryEntry>> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| {
            (&a.registry_key, &a.registry_value).cmp(&(&b.registry_key, &b.registry_value))
        });
        Ok(entries)
    }

    async fn remove_dead(&self, updated_before: DateTime<Utc>) -> SchedulerResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.update_time >= updated_before);
        Ok(before - entries.len())
    }
}
