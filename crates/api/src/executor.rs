//! 执行器 HTTP 接口：`POST /beat`、`/idleBeat`、`/run`、`/kill`、`/log`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::Value;
use taskmesh_executor::ExecutorBiz;

use crate::error::{RpcRejection, RpcResult};
use crate::rpc::{empty_mapping, ensure_post, ensure_token, health_body, parse_body};

#[derive(Clone)]
pub struct ExecutorState {
    pub biz: Arc<ExecutorBiz>,
    pub access_token: Option<String>,
}

pub fn executor_router(state: ExecutorState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", any(empty_mapping))
        .route("/{op}", any(executor_rpc))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    health_body("taskmesh-executor")
}

async fn executor_rpc(
    State(state): State<ExecutorState>,
    method: Method,
    Path(op): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RpcResult<Response> {
    ensure_post(&method)?;
    ensure_token(&headers, state.access_token.as_deref())?;

    let biz = &state.biz;
    let response = match op.as_str() {
        "beat" => Json(biz.beat()).into_response(),
        "idleBeat" => Json(biz.idle_beat(parse_body(&body)?)).into_response(),
        "run" => Json(biz.run(parse_body(&body)?)).into_response(),
        "kill" => Json(biz.kill(parse_body(&body)?)).into_response(),
        "log" => Json(biz.log(parse_body(&body)?).await).into_response(),
        _ => return Err(RpcRejection::MappingNotFound(op)),
    };
    Ok(response)
}
