use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;

use super::{CacheExpiry, ExecutorRouteStrategy, RouteDecision, ROUTE_CACHE_TTL_MS};

/// 计数超过该值后重新随机起点
const COUNTER_RESEED_THRESHOLD: u64 = 1_000_000;

/// 按任务轮询，每个任务从随机位置开始，避免所有任务首次都落在第一台机器
pub struct RoundRobinStrategy {
    counters: DashMap<i64, u64>,
    expiry: CacheExpiry,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            expiry: CacheExpiry::new(ROUTE_CACHE_TTL_MS),
        }
    }

    fn seed() -> u64 {
        rand::rng().random_range(0..100)
    }

    pub(crate) fn next_count(&self, job_id: i64, now_ms: i64) -> u64 {
        if self.expiry.check_expired(now_ms) {
            self.counters.clear();
        }

        match self.counters.entry(job_id) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                let next = if current > COUNTER_RESEED_THRESHOLD {
                    Self::seed()
                } else {
                    current + 1
                };
                entry.insert(next);
                next
            }
            Entry::Vacant(entry) => {
                let seeded = Self::seed();
                entry.insert(seeded);
                seeded
            }
        }
    }

    pub(crate) fn select(&self, job_id: i64, addresses: &[String], now_ms: i64) -> String {
        let count = self.next_count(job_id, now_ms);
        addresses[(count % addresses.len() as u64) as usize].clone()
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutorRouteStrategy for RoundRobinStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        if addresses.is_empty() {
            return RouteDecision::rejected("执行器地址为空");
        }
        let now_ms = Utc::now().timestamp_millis();
        RouteDecision::selected(self.select(job_id, addresses, now_ms))
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}
