use std::sync::Arc;

use async_trait::async_trait;
use taskmesh_domain::{ExecutorClientFactory, IdleBeatParam, ReturnT};
use tracing::debug;

use super::{ExecutorRouteStrategy, RouteDecision};

#[derive(Debug, Clone, Copy)]
enum ProbeKind {
    Beat,
    IdleBeat,
}

impl ProbeKind {
    fn label(&self) -> &'static str {
        match self {
            ProbeKind::Beat => "心跳检测",
            ProbeKind::IdleBeat => "空闲检测",
        }
    }
}

/// 按顺序探测候选地址，第一个探测成功的地址胜出
struct Prober {
    clients: Arc<dyn ExecutorClientFactory>,
    kind: ProbeKind,
}

impl Prober {
    async fn probe(&self, job_id: i64, address: &str) -> ReturnT<String> {
        let client = match self.clients.client(address) {
            Ok(client) => client,
            Err(e) => return ReturnT::fail(e.to_string()),
        };

        let result = match self.kind {
            ProbeKind::Beat => client.beat().await,
            ProbeKind::IdleBeat => client.idle_beat(IdleBeatParam { job_id }).await,
        };
        result.unwrap_or_else(|e| ReturnT::fail(e.to_string()))
    }

    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        let mut trail = Vec::with_capacity(addresses.len());

        for address in addresses {
            let result = self.probe(job_id, address).await;
            trail.push(format!(
                "{}: address: {}, code: {}, msg: {}",
                self.kind.label(),
                address,
                result.code,
                result.msg_or_empty()
            ));

            if result.is_success() {
                debug!("{}通过, 任务 {} 选择地址 {}", self.kind.label(), job_id, address);
                return RouteDecision::selected_with_trail(address.clone(), trail.join("\n"));
            }
        }

        RouteDecision::rejected(trail.join("\n"))
    }
}

/// 故障转移：使用 `beat` 探测存活
pub struct FailoverStrategy {
    prober: Prober,
}

impl FailoverStrategy {
    pub fn new(clients: Arc<dyn ExecutorClientFactory>) -> Self {
        Self {
            prober: Prober {
                clients,
                kind: ProbeKind::Beat,
            },
        }
    }
}

#[async_trait]
impl ExecutorRouteStrategy for FailoverStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        self.prober.route(job_id, addresses).await
    }

    fn name(&self) -> &str {
        "Failover"
    }
}

/// 忙碌转移：使用 `idleBeat` 探测该任务在执行器上是否空闲
pub struct BusyoverStrategy {
    prober: Prober,
}

impl BusyoverStrategy {
    pub fn new(clients: Arc<dyn ExecutorClientFactory>) -> Self {
        Self {
            prober: Prober {
                clients,
                kind: ProbeKind::IdleBeat,
            },
        }
    }
}

#[async_trait]
impl ExecutorRouteStrategy for BusyoverStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        self.prober.route(job_id, addresses).await
    }

    fn name(&self) -> &str {
        "Busyover"
    }
}
