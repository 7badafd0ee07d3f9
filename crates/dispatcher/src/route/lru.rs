use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use lru::LruCache;

use super::{CacheExpiry, ExecutorRouteStrategy, RouteDecision, ROUTE_CACHE_TTL_MS};

/// 最近最久未使用：每个任务维护一个按访问顺序排列的地址缓存
pub struct LeastRecentlyUsedStrategy {
    access_order: DashMap<i64, LruCache<String, ()>>,
    expiry: CacheExpiry,
}

impl LeastRecentlyUsedStrategy {
    pub fn new() -> Self {
        Self {
            access_order: DashMap::new(),
            expiry: CacheExpiry::new(ROUTE_CACHE_TTL_MS),
        }
    }

    pub(crate) fn select(&self, job_id: i64, addresses: &[String], now_ms: i64) -> Option<String> {
        if self.expiry.check_expired(now_ms) {
            self.access_order.clear();
        }

        let mut order = self
            .access_order
            .entry(job_id)
            .or_insert_with(LruCache::unbounded);

        for address in addresses {
            if !order.contains(address) {
                order.put(address.clone(), ());
            }
        }
        let vanished: Vec<String> = order
            .iter()
            .filter(|(address, _)| !addresses.contains(*address))
            .map(|(address, _)| address.clone())
            .collect();
        for address in &vanished {
            order.pop(address);
        }

        let eldest = order.peek_lru().map(|(address, _)| address.clone())?;
        order.promote(&eldest);
        Some(eldest)
    }
}

impl Default for LeastRecentlyUsedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutorRouteStrategy for LeastRecentlyUsedStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        let now_ms = Utc::now().timestamp_millis();
        match self.select(job_id, addresses, now_ms) {
            Some(address) => RouteDecision::selected(address),
            None => RouteDecision::rejected("执行器地址为空"),
        }
    }

    fn name(&self) -> &str {
        "LeastRecentlyUsed"
    }
}
