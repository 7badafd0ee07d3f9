use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;

use super::{CacheExpiry, ExecutorRouteStrategy, RouteDecision, ROUTE_CACHE_TTL_MS};

const USE_COUNT_RESEED_THRESHOLD: u32 = 1_000_000;

/// 最不经常使用：选择使用次数最少的地址，新地址以随机次数加入，避免集中到新机器
pub struct LeastFrequentlyUsedStrategy {
    use_counts: DashMap<i64, HashMap<String, u32>>,
    expiry: CacheExpiry,
}

impl LeastFrequentlyUsedStrategy {
    pub fn new() -> Self {
        Self {
            use_counts: DashMap::new(),
            expiry: CacheExpiry::new(ROUTE_CACHE_TTL_MS),
        }
    }

    pub(crate) fn select(&self, job_id: i64, addresses: &[String], now_ms: i64) -> Option<String> {
        if self.expiry.check_expired(now_ms) {
            self.use_counts.clear();
        }

        let mut counts = self.use_counts.entry(job_id).or_default();
        let mut rng = rand::rng();

        for address in addresses {
            let needs_seed = counts
                .get(address)
                .map_or(true, |count| *count > USE_COUNT_RESEED_THRESHOLD);
            if needs_seed {
                counts.insert(address.clone(), rng.random_range(0..addresses.len() as u32));
            }
        }
        counts.retain(|address, _| addresses.contains(address));

        let (address, count) = counts
            .iter_mut()
            .min_by(|(a_addr, a_count), (b_addr, b_count)| {
                a_count.cmp(b_count).then_with(|| a_addr.cmp(b_addr))
            })?;
        *count += 1;
        Some(address.clone())
    }
}

impl Default for LeastFrequentlyUsedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutorRouteStrategy for LeastFrequentlyUsedStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        let now_ms = Utc::now().timestamp_millis();
        match self.select(job_id, addresses, now_ms) {
            Some(address) => RouteDecision::selected(address),
            None => RouteDecision::rejected("执行器地址为空"),
        }
    }

    fn name(&self) -> &str {
        "LeastFrequentlyUsed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_evens_out() {
        let strategy = LeastFrequentlyUsedStrategy::new();
        let addresses: Vec<String> = vec!["A".into(), "B".into(), "C".into()];

        for _ in 0..30 {
            strategy.select(1, &addresses, 1_000).unwrap();
        }

        let counts = strategy.use_counts.get(&1).unwrap();
        let max = counts.values().max().unwrap();
        let min = counts.values().min().unwrap();
        assert!(max - min <= 1, "counts should stay balanced: {:?}", *counts);
    }

    #[test]
    fn test_vanished_address_removed() {
        let strategy = LeastFrequentlyUsedStrategy::new();
        strategy.select(1, &["A".to_string(), "B".to_string()], 1_000);
        let pick = strategy.select(1, &["B".to_string()], 1_000).unwrap();
        assert_eq!(pick, "B");
        assert!(!strategy.use_counts.get(&1).unwrap().contains_key("A"));
    }
}
