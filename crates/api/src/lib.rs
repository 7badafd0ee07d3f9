//! # taskmesh API
//!
//! 调度中心与执行器之间的 HTTP 传输层，基于 Axum。
//!
//! 两个方向的 RPC 使用同一套约定：
//! - 只接受 `POST`，请求与响应体都是 JSON，字段名为 camelCase
//! - 响应统一为 `{code, msg, content}` 信封，HTTP 状态码始终为 200
//! - 配置了访问令牌时校验 `TASKMESH-ACCESS-TOKEN` 请求头
//!
//! ## 调度中心
//!
//! - `POST /api/callback` - 执行结果回调
//! - `POST /api/registry` - 执行器注册
//! - `POST /api/registryRemove` - 执行器注销
//! - `POST /jobs/{id}/trigger` - 手动触发任务
//! - `GET /health` - 健康检查
//!
//! ## 执行器
//!
//! - `POST /beat`、`/idleBeat`、`/run`、`/kill`、`/log`
//! - `GET /health` - 健康检查
//!
//! ```no_run
//! # async fn serve(state: taskmesh_api::ExecutorState) -> std::io::Result<()> {
//! let app = taskmesh_api::with_http_layers(taskmesh_api::executor_router(state));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9999").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

pub mod admin;
pub mod error;
pub mod executor;
pub mod middleware;
mod rpc;

use axum::Router;
use tower::ServiceBuilder;

pub use admin::{admin_router, AdminState, ManualTriggerRequest};
pub use error::{RpcRejection, RpcResult};
pub use executor::{executor_router, ExecutorState};

use middleware::{cors_layer, request_logging, trace_layer};

/// 加上请求日志、追踪与 CORS 中间件
pub fn with_http_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
