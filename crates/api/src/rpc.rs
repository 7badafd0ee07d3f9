//! 两个方向的 RPC 共用的请求校验

use axum::{
    body::Bytes,
    http::{HeaderMap, Method},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use taskmesh_domain::ACCESS_TOKEN_HEADER;

use crate::error::{RpcRejection, RpcResult};

/// 只接受 POST
pub(crate) fn ensure_post(method: &Method) -> RpcResult<()> {
    if method != Method::POST {
        return Err(RpcRejection::MethodNotSupported);
    }
    Ok(())
}

/// 配置了访问令牌时，请求头中的令牌必须一致
pub(crate) fn ensure_token(headers: &HeaderMap, expected: Option<&str>) -> RpcResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if actual != Some(expected) {
        return Err(RpcRejection::AccessTokenWrong);
    }
    Ok(())
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> RpcResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// 请求路径中缺少操作名
pub(crate) async fn empty_mapping(method: Method) -> RpcRejection {
    match ensure_post(&method) {
        Err(rejection) => rejection,
        Ok(()) => RpcRejection::EmptyMapping,
    }
}

pub(crate) fn health_body(service: &str) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": service,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_check() {
        let mut headers = HeaderMap::new();
        assert!(ensure_token(&headers, None).is_ok());
        assert!(matches!(
            ensure_token(&headers, Some("secret")),
            Err(RpcRejection::AccessTokenWrong)
        ));

        headers.insert(ACCESS_TOKEN_HEADER, HeaderValue::from_static("secret"));
        assert!(ensure_token(&headers, Some("secret")).is_ok());
        assert!(ensure_token(&headers, Some("other")).is_err());
    }

    #[test]
    fn test_method_check() {
        assert!(ensure_post(&Method::POST).is_ok());
        assert!(matches!(
            ensure_post(&Method::GET),
            Err(RpcRejection::MethodNotSupported)
        ));
    }
}
