use async_trait::async_trait;
use rand::Rng;

use super::{ExecutorRouteStrategy, RouteDecision};

pub struct FirstStrategy;

#[async_trait]
impl ExecutorRouteStrategy for FirstStrategy {
    async fn route(&self, _job_id: i64, addresses: &[String]) -> RouteDecision {
        match addresses.first() {
            Some(address) => RouteDecision::selected(address.clone()),
            None => RouteDecision::rejected("执行器地址为空"),
        }
    }

    fn name(&self) -> &str {
        "First"
    }
}

pub struct LastStrategy;

#[async_trait]
impl ExecutorRouteStrategy for LastStrategy {
    async fn route(&self, _job_id: i64, addresses: &[String]) -> RouteDecision {
        match addresses.last() {
            Some(address) => RouteDecision::selected(address.clone()),
            None => RouteDecision::rejected("执行器地址为空"),
        }
    }

    fn name(&self) -> &str {
        "Last"
    }
}

pub struct RandomStrategy;

#[async_trait]
impl ExecutorRouteStrategy for RandomStrategy {
    async fn route(&self, _job_id: i64, addresses: &[String]) -> RouteDecision {
        if addresses.is_empty() {
            return RouteDecision::rejected("执行器地址为空");
        }
        let index = rand::rng().random_range(0..addresses.len());
        RouteDecision::selected(addresses[index].clone())
    }

    fn name(&self) -> &str {
        "Random"
    }
}
