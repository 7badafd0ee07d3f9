//! 调度中心 HTTP 接口
//!
//! - `POST /api/callback`、`/api/registry`、`/api/registryRemove`：执行器调用
//! - `POST /jobs/{id}/trigger`：手动触发任务
//! - `GET /health`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskmesh_core::SchedulerError;
use taskmesh_dispatcher::{AdminBiz, TriggerRequest, TriggerSubmitter};
use taskmesh_domain::{JobRepository, ReturnT, TriggerType};
use tracing::info;

use crate::error::{RpcRejection, RpcResult};
use crate::rpc::{empty_mapping, ensure_post, ensure_token, health_body, parse_body};

#[derive(Clone)]
pub struct AdminState {
    pub biz: Arc<AdminBiz>,
    pub jobs: Arc<dyn JobRepository>,
    pub trigger: Arc<dyn TriggerSubmitter>,
    pub access_token: Option<String>,
}

/// 手动触发时可覆盖的参数
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualTriggerRequest {
    pub executor_param: Option<String>,
    pub address_list: Option<String>,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api", any(empty_mapping))
        .route("/api/", any(empty_mapping))
        .route("/api/{op}", any(admin_rpc))
        .route("/jobs/{id}/trigger", post(manual_trigger))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    health_body("taskmesh-admin")
}

async fn admin_rpc(
    State(state): State<AdminState>,
    method: Method,
    Path(op): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RpcResult<Json<ReturnT<String>>> {
    ensure_post(&method)?;
    ensure_token(&headers, state.access_token.as_deref())?;

    let result = match op.as_str() {
        "callback" => state.biz.callback(parse_body(&body)?).await,
        "registry" => state.biz.registry(parse_body(&body)?).await,
        "registryRemove" => state.biz.registry_remove(parse_body(&body)?).await,
        _ => return Err(RpcRejection::MappingNotFound(op)),
    };
    Ok(Json(result))
}

async fn manual_trigger(
    State(state): State<AdminState>,
    Path(job_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> RpcResult<Json<ReturnT<String>>> {
    ensure_token(&headers, state.access_token.as_deref())?;
    let request: ManualTriggerRequest = if body.is_empty() {
        ManualTriggerRequest::default()
    } else {
        parse_body(&body)?
    };

    if state.jobs.find_by_id(job_id).await?.is_none() {
        return Err(SchedulerError::JobNotFound { id: job_id }.into());
    }

    state.trigger.submit(
        TriggerRequest::new(job_id, TriggerType::Manual)
            .with_executor_param(request.executor_param)
            .with_address_list(request.address_list),
    )?;
    info!(job_id, "手动触发任务已提交");
    Ok(Json(ReturnT::success()))
}
