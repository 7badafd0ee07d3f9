use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{ReturnT, ACCESS_TOKEN_HEADER};
use tracing::debug;

#[derive(Debug, Clone)]
pub(crate) struct RpcHttp {
    client: reqwest::Client,
    access_token: Option<String>,
}

impl RpcHttp {
    pub(crate) fn new(timeout: Duration, access_token: Option<String>) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self {
            client,
            access_token: access_token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub(crate) async fn post<B, R>(&self, url: &str, body: &B) -> SchedulerResult<ReturnT<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("RPC请求: POST {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("RPC请求失败, url: {url}, error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Network(format!(
                "RPC响应状态异常, url: {url}, status: {status}, body: {body}"
            )));
        }

        response.json::<ReturnT<R>>().await.map_err(|e| {
            SchedulerError::Serialization(format!("RPC响应解析失败, url: {url}, error: {e}"))
        })
    }
}

/// 拼接地址与操作名，兼容地址末尾的 `/`
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://127.0.0.1:9999/", "run"), "http://127.0.0.1:9999/run");
        assert_eq!(join_url("http://127.0.0.1:8080", "/api/callback"), "http://127.0.0.1:8080/api/callback");
    }

    #[test]
    fn test_blank_token_ignored() {
        let http = RpcHttp::new(Duration::from_secs(1), Some("  ".to_string())).unwrap();
        assert!(http.access_token.is_none());
    }
}
