//! 可编排响应的RPC桩实现
//!
//! 每个地址的 `beat` / `idleBeat` / `run` 结果可以单独设置，所有调用都会被记录，
//! 便于断言路由与调度行为。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{
    AdminClient, ExecutorClient, ExecutorClientFactory, HandleCallbackParam, IdleBeatParam,
    KillParam, LogParam, LogResult, RegistryParam, ReturnT, TriggerParam,
};

/// 预设的调用结果
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Success,
    Fail(String),
    /// 传输层错误，如连接被拒绝
    Error(String),
}

impl Scripted {
    fn respond(&self) -> SchedulerResult<ReturnT<String>> {
        match self {
            Scripted::Success => Ok(ReturnT::success()),
            Scripted::Fail(msg) => Ok(ReturnT::fail(msg.clone())),
            Scripted::Error(msg) => Err(SchedulerError::Network(msg.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Beat,
    IdleBeat(i64),
    Run(TriggerParam),
    Kill(i64),
    Log(LogParam),
}

#[derive(Debug)]
pub struct ScriptedExecutorClient {
    address: String,
    beat: Mutex<Scripted>,
    idle_beat: Mutex<Scripted>,
    run: Mutex<Scripted>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedExecutorClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            beat: Mutex::new(Scripted::Success),
            idle_beat: Mutex::new(Scripted::Success),
            run: Mutex::new(Scripted::Success),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_beat(&self, scripted: Scripted) {
        *self.beat.lock().unwrap() = scripted;
    }

    pub fn set_idle_beat(&self, scripted: Scripted) {
        *self.idle_beat.lock().unwrap() = scripted;
    }

    pub fn set_run(&self, scripted: Scripted) {
        *self.run.lock().unwrap() = scripted;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExecutorClient for ScriptedExecutorClient {
    async fn beat(&self) -> SchedulerResult<ReturnT<String>> {
        self.record(RecordedCall::Beat);
        let scripted = self.beat.lock().unwrap().clone();
        scripted.respond()
    }

    async fn idle_beat(&self, param: IdleBeatParam) -> SchedulerResult<ReturnT<String>> {
        self.record(RecordedCall::IdleBeat(param.job_id));
        let scripted = self.idle_beat.lock().unwrap().clone();
        scripted.respond()
    }

    async fn run(&self, param: TriggerParam) -> SchedulerResult<ReturnT<String>> {
        self.record(RecordedCall::Run(param));
        let scripted = self.run.lock().unwrap().clone();
        scripted.respond()
    }

    async fn kill(&self, param: KillParam) -> SchedulerResult<ReturnT<String>> {
        self.record(RecordedCall::Kill(param.job_id));
        Ok(ReturnT::success())
    }

    async fn log(&self, param: LogParam) -> SchedulerResult<ReturnT<LogResult>> {
        self.record(RecordedCall::Log(param));
        Ok(ReturnT::success_with(LogResult {
            from_line_num: param.from_line_num,
            to_line_num: param.from_line_num,
            log_content: String::new(),
            is_end: false,
        }))
    }
}

/// 按地址创建并保存 [`ScriptedExecutorClient`]
#[derive(Debug, Default)]
pub struct ScriptedClientFactory {
    clients: Mutex<HashMap<String, Arc<ScriptedExecutorClient>>>,
}

impl ScriptedClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(&self, address: &str) -> Arc<ScriptedExecutorClient> {
        self.clients
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(ScriptedExecutorClient::new(address)))
            .clone()
    }

    /// 所有地址收到的 run 调用
    pub fn run_calls(&self) -> Vec<(String, TriggerParam)> {
        let clients = self.clients.lock().unwrap();
        let mut runs = Vec::new();
        for (address, client) in clients.iter() {
            for call in client.calls() {
                if let RecordedCall::Run(param) = call {
                    runs.push((address.clone(), param));
                }
            }
        }
        runs.sort_by_key(|(_, param)| param.log_id);
        runs
    }
}

impl ExecutorClientFactory for ScriptedClientFactory {
    fn client(&self, address: &str) -> SchedulerResult<Arc<dyn ExecutorClient>> {
        Ok(self.scripted(address))
    }
}

/// 记录收到的回调与注册请求
#[derive(Debug)]
pub struct RecordingAdminClient {
    address: String,
    failing: AtomicBool,
    callbacks: Mutex<Vec<HandleCallbackParam>>,
    registries: Mutex<Vec<RegistryParam>>,
    removals: Mutex<Vec<RegistryParam>>,
}

impl RecordingAdminClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            failing: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
            registries: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        }
    }

    /// 模拟调度中心不可用
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn callbacks(&self) -> Vec<HandleCallbackParam> {
        self.callbacks.lock().unwrap().clone()
    }

    pub fn registries(&self) -> Vec<RegistryParam> {
        self.registries.lock().unwrap().clone()
    }

    pub fn removals(&self) -> Vec<RegistryParam> {
        self.removals.lock().unwrap().clone()
    }

    fn check_available(&self) -> SchedulerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulerError::Network(format!(
                "connection refused: {}",
                self.address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminClient for RecordingAdminClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn callback(&self, params: Vec<HandleCallbackParam>) -> SchedulerResult<ReturnT<String>> {
        self.check_available()?;
        self.callbacks.lock().unwrap().extend(params);
        Ok(ReturnT::success())
    }

    async fn registry(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>> {
        self.check_available()?;
        self.registries.lock().unwrap().push(param);
        Ok(ReturnT::success())
    }

    async fn registry_remove(&self, param: RegistryParam) -> SchedulerResult<ReturnT<String>> {
        self.check_available()?;
        self.removals.lock().unwrap().push(param);
        Ok(ReturnT::success())
    }
}
