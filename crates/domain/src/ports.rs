//! 调度中心与执行器之间的远程调用接口

use std::sync::Arc;

use async_trait::async_trait;
use taskmesh_core::SchedulerResult;

use crate::rpc::{
    HandleCallbackParam, IdleBeatParam, KillParam, LogParam, LogResult, RegistryParam, ReturnT,
    TriggerParam,
};

/// 调度中心调用单个执行器地址
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    async fn beat(&self) -> SchedulerResult<ReturnT<String>>;
    async fn idle_beat(&self, param: IdleBeatParam) -> SchedulerResult<ReturnT<String>>;
    async fn run(&self, param: TriggerParam) -> SchedulerResult<ReturnT<String>>;
    async fn kill(&self, param: KillParam) -> SchedulerResult<ReturnT<String>>;
    async fn log(&self, param: LogParam) -> SchedulerResult<ReturnT<LogResult>>;
}

/// 按地址获取执行器客户端
pub trait ExecutorClientFactory: Send + Sync {
    fn client(&self, address: &str) -> SchedulerResult<Arc<dyn ExecutorClient>>;
}

/// 执行器调用单个调度中心地址
#[async_trait]
pub trait AdminClient: Send + Sync {
    fn address(&self) -> &str;
    async fn callback(&self, params: Vec<HandleCallbackParam>) -> SchedulerResult<ReturnT<String>>;
    async fn registry(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>>;
    async fn registry_remove(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>>;
}
