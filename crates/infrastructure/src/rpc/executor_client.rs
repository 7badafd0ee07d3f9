use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{
    ExecutorClient, ExecutorClientFactory, IdleBeatParam, KillParam, LogParam, LogResult,
    ReturnT, TriggerParam,
};

use super::http::{join_url, RpcHttp};

/// 调用单个执行器地址的HTTP客户端
#[derive(Debug, Clone)]
pub struct HttpExecutorClient {
    address: String,
    http: RpcHttp,
}

impl HttpExecutorClient {
    pub fn new(
        address: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> SchedulerResult<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(SchedulerError::Validation("执行器地址不能为空".to_string()));
        }
        Ok(Self {
            address,
            http: RpcHttp::new(timeout, access_token)?,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ExecutorClient for HttpExecutorClient {
    async fn beat(&self) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&join_url(&self.address, "beat"), &()).await
    }

    async fn idle_beat(&self, param: IdleBeatParam) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&join_url(&self.address, "idleBeat"), &param).await
    }

    async fn run(&self, param: TriggerParam) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&join_url(&self.address, "run"), &param).await
    }

    async fn kill(&self, param: KillParam) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&join_url(&self.address, "kill"), &param).await
    }

    async fn log(&self, param: LogParam) -> SchedulerResult<ReturnT<LogResult>> {
        self.http.post(&join_url(&self.address, "log"), &param).await
    }
}

/// 按地址缓存执行器客户端
pub struct ExecutorClientPool {
    clients: DashMap<String, Arc<HttpExecutorClient>>,
    access_token: Option<String>,
    timeout: Duration,
}

impl ExecutorClientPool {
    pub fn new(access_token: Option<String>, timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            access_token,
            timeout,
        }
    }

    pub fn cached_count(&self) -> usize {
        self.clients.len()
    }
}

impl ExecutorClientFactory for ExecutorClientPool {
    fn client(&self, address: &str) -> SchedulerResult<Arc<dyn ExecutorClient>> {
        let address = address.trim();
        if let Some(client) = self.clients.get(address) {
            return Ok(client.clone());
        }

        let client = Arc::new(HttpExecutorClient::new(
            address,
            self.access_token.clone(),
            self.timeout,
        )?);
        let client = self
            .clients
            .entry(address.to_string())
            .or_insert(client)
            .clone();
        Ok(client)
    }
}
