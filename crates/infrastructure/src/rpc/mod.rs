//! 基于HTTP的RPC客户端
//!
//! 所有调用均为 `POST` JSON，响应体为 `ReturnT` 信封。配置了访问令牌时通过
//! `TASKMESH-ACCESS-TOKEN` 请求头传递。

mod admin_client;
mod executor_client;
mod http;

pub use admin_client::HttpAdminClient;
pub use executor_client::{ExecutorClientPool, HttpExecutorClient};
