use std::time::Duration;

use async_trait::async_trait;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{AdminClient, HandleCallbackParam, RegistryParam, ReturnT};

use super::http::{join_url, RpcHttp};

/// 调用单个调度中心地址的HTTP客户端
#[derive(Debug, Clone)]
pub struct HttpAdminClient {
    address: String,
    http: RpcHttp,
}

impl HttpAdminClient {
    pub fn new(
        address: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> SchedulerResult<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(SchedulerError::Validation("调度中心地址不能为空".to_string()));
        }
        Ok(Self {
            address,
            http: RpcHttp::new(timeout, access_token)?,
        })
    }

    fn api_url(&self, op: &str) -> String {
        join_url(&join_url(&self.address, "api"), op)
    }
}

#[async_trait]
impl AdminClient for HttpAdminClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn callback(&self, params: Vec<HandleCallbackParam>) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&self.api_url("callback"), &params).await
    }

    async fn registry(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&self.api_url("registry"), &param).await
    }

    async fn registry_remove(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>> {
        self.http.post(&self.api_url("registryRemove"), &param).await
    }
}
