use axum::{
    response::{IntoResponse, Response},
    Json,
};
use taskmesh_core::SchedulerError;
use taskmesh_domain::ReturnT;
use tracing::warn;

/// RPC 请求在进入业务逻辑之前被拒绝的原因
///
/// 所有拒绝都以 HTTP 200 + 失败信封返回，调用方只看 `code`。
#[derive(Debug, thiserror::Error)]
pub enum RpcRejection {
    #[error("invalid request, HttpMethod not support.")]
    MethodNotSupported,

    #[error("invalid request, uri-mapping empty.")]
    EmptyMapping,

    #[error("The access token is wrong.")]
    AccessTokenWrong,

    #[error("invalid request, uri-mapping({0}) not found.")]
    MappingNotFound(String),

    #[error("invalid request, body parse fail: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("{0}")]
    Scheduler(#[from] SchedulerError),
}

impl IntoResponse for RpcRejection {
    fn into_response(self) -> Response {
        warn!("RPC请求被拒绝: {}", self);
        Json(ReturnT::<String>::fail(self.to_string())).into_response()
    }
}

pub type RpcResult<T> = Result<T, RpcRejection>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            RpcRejection::MappingNotFound("foo".to_string()).to_string(),
            "invalid request, uri-mapping(foo) not found."
        );
        assert_eq!(
            RpcRejection::Scheduler(SchedulerError::JobNotFound { id: 7 }).to_string(),
            SchedulerError::JobNotFound { id: 7 }.to_string()
        );
    }
}
