//! 执行器注册表维护
//!
//! 周期性清理超过3个心跳周期未续约的注册信息，并把存活地址同步到自动注册的执行器分组。

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{
    AddressType, ExecutorGroupRepository, RegistryEntry, RegistryRepository, RegistryType,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

pub struct RegistryMonitor {
    groups: Arc<dyn ExecutorGroupRepository>,
    registry: Arc<dyn RegistryRepository>,
    beat_interval: Duration,
    dead_timeout: Duration,
}

impl RegistryMonitor {
    pub fn new(
        groups: Arc<dyn ExecutorGroupRepository>,
        registry: Arc<dyn RegistryRepository>,
        beat_interval: Duration,
        dead_timeout: Duration,
    ) -> Self {
        Self {
            groups,
            registry,
            beat_interval,
            dead_timeout,
        }
    }

    fn dead_before(&self) -> chrono::DateTime<Utc> {
        let dead_timeout = chrono::Duration::from_std(self.dead_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(90));
        Utc::now() - dead_timeout
    }

    /// 未过期的执行器注册信息
    async fn live_executor_entries(&self) -> SchedulerResult<Vec<RegistryEntry>> {
        let dead_before = self.dead_before();
        Ok(self
            .registry
            .find_all()
            .await?
            .into_iter()
            .filter(|entry| {
                entry.registry_group == RegistryType::Executor.as_str()
                    && entry.update_time >= dead_before
            })
            .collect())
    }

    /// 所有存活的执行器地址
    pub async fn live_addresses(&self) -> SchedulerResult<HashSet<String>> {
        Ok(self
            .live_executor_entries()
            .await?
            .into_iter()
            .map(|entry| entry.registry_value)
            .collect())
    }

    /// 按注册表刷新自动注册分组的地址列表
    pub async fn refresh_groups(&self) -> SchedulerResult<()> {
        let mut by_app: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in self.live_executor_entries().await? {
            by_app
                .entry(entry.registry_key)
                .or_default()
                .insert(entry.registry_value);
        }

        for group in self.groups.find_all().await? {
            if group.address_type != AddressType::Auto {
                continue;
            }
            let address_list = by_app
                .get(&group.app_name)
                .map(|addresses| addresses.iter().cloned().collect::<Vec<_>>().join(","))
                .filter(|list| !list.is_empty());
            if address_list != group.address_list {
                debug!(
                    "执行器分组 {} 地址变更: {:?} -> {:?}",
                    group.app_name, group.address_list, address_list
                );
                self.groups
                    .update_address_list(group.id, address_list)
                    .await?;
            }
        }
        Ok(())
    }

    /// 清理过期注册并刷新分组地址
    pub async fn refresh_once(&self) -> SchedulerResult<()> {
        let removed = self.registry.remove_dead(self.dead_before()).await?;
        if removed > 0 {
            info!("清理过期执行器注册信息 {} 条", removed);
        }
        self.refresh_groups().await
    }

    pub async fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("执行器注册监控已启动, 周期: {:?}", self.beat_interval);
        let mut interval = tokio::time::interval(self.beat_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.refresh_once().await {
                        error!("执行器注册监控异常: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("执行器注册监控已停止");
                    break;
                }
            }
        }
    }
}
