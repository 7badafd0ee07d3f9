//! 执行器路由策略
//!
//! 每种 [`RouteStrategy`] 对应一个实现了 [`ExecutorRouteStrategy`] 的策略对象，由
//! [`ExecutorRouter`] 按枚举值分派。分片广播不是单地址路由，由触发器直接展开。
//!
//! 轮询、LFU、LRU 三种策略按任务ID保存状态，状态每24小时整体清空一次。

mod basic;
mod consistent_hash;
mod failover;
mod lfu;
mod lru;
mod round_robin;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use taskmesh_domain::{ExecutorClientFactory, RouteStrategy};
use tracing::debug;

pub use basic::{FirstStrategy, LastStrategy, RandomStrategy};
pub use consistent_hash::ConsistentHashStrategy;
pub use failover::{BusyoverStrategy, FailoverStrategy};
pub use lfu::LeastFrequentlyUsedStrategy;
pub use lru::LeastRecentlyUsedStrategy;
pub use round_robin::RoundRobinStrategy;

/// 路由状态缓存有效期
pub const ROUTE_CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// 路由结果：选中的地址或失败原因，附带探测过程的诊断信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub address: Option<String>,
    pub message: Option<String>,
}

impl RouteDecision {
    pub fn selected(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            message: None,
        }
    }

    pub fn selected_with_trail(address: impl Into<String>, trail: String) -> Self {
        Self {
            address: Some(address.into()),
            message: Some(trail),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            address: None,
            message: Some(reason.into()),
        }
    }

    pub fn is_selected(&self) -> bool {
        self.address.is_some()
    }
}

#[async_trait]
pub trait ExecutorRouteStrategy: Send + Sync {
    /// `addresses` 保证非空
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision;

    fn name(&self) -> &str;
}

/// 按时间戳判定的缓存过期标记，并发重置只会有一个调用方成功
#[derive(Debug)]
pub(crate) struct CacheExpiry {
    valid_until: AtomicI64,
    ttl_ms: i64,
}

impl CacheExpiry {
    pub(crate) fn new(ttl_ms: i64) -> Self {
        Self {
            valid_until: AtomicI64::new(0),
            ttl_ms,
        }
    }

    /// 过期时推进有效期并返回 true，调用方负责清空缓存
    pub(crate) fn check_expired(&self, now_ms: i64) -> bool {
        let until = self.valid_until.load(Ordering::Acquire);
        if now_ms <= until {
            return false;
        }
        self.valid_until
            .compare_exchange(until, now_ms + self.ttl_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// 路由策略表
pub struct ExecutorRouter {
    first: FirstStrategy,
    last: LastStrategy,
    round: RoundRobinStrategy,
    random: RandomStrategy,
    consistent_hash: ConsistentHashStrategy,
    lfu: LeastFrequentlyUsedStrategy,
    lru: LeastRecentlyUsedStrategy,
    failover: FailoverStrategy,
    busyover: BusyoverStrategy,
}

impl ExecutorRouter {
    pub fn new(clients: Arc<dyn ExecutorClientFactory>) -> Self {
        Self {
            first: FirstStrategy,
            last: LastStrategy,
            round: RoundRobinStrategy::new(),
            random: RandomStrategy,
            consistent_hash: ConsistentHashStrategy,
            lfu: LeastFrequentlyUsedStrategy::new(),
            lru: LeastRecentlyUsedStrategy::new(),
            failover: FailoverStrategy::new(clients.clone()),
            busyover: BusyoverStrategy::new(clients),
        }
    }

    /// 分片广播没有对应的单地址策略
    pub fn strategy(&self, kind: RouteStrategy) -> Option<&dyn ExecutorRouteStrategy> {
        match kind {
            RouteStrategy::First => Some(&self.first),
            RouteStrategy::Last => Some(&self.last),
            RouteStrategy::Round => Some(&self.round),
            RouteStrategy::Random => Some(&self.random),
            RouteStrategy::ConsistentHash => Some(&self.consistent_hash),
            RouteStrategy::LeastFrequentlyUsed => Some(&self.lfu),
            RouteStrategy::LeastRecentlyUsed => Some(&self.lru),
            RouteStrategy::Failover => Some(&self.failover),
            RouteStrategy::Busyover => Some(&self.busyover),
            RouteStrategy::ShardingBroadcast => None,
        }
    }

    pub async fn route(
        &self,
        kind: RouteStrategy,
        job_id: i64,
        addresses: &[String],
    ) -> RouteDecision {
        if addresses.is_empty() {
            return RouteDecision::rejected("执行器地址为空");
        }

        let Some(strategy) = self.strategy(kind) else {
            return RouteDecision::rejected(format!("路由策略 {} 不支持单地址路由", kind));
        };

        let decision = strategy.route(job_id, addresses).await;
        debug!(
            "路由策略 {} 为任务 {} 选择地址: {:?}",
            strategy.name(),
            job_id,
            decision.address
        );
        metrics::counter!(
            "taskmesh_route_total",
            "strategy" => kind.as_str(),
            "selected" => if decision.is_selected() { "true" } else { "false" }
        )
        .increment(1);
        decision
    }
}
