//! 执行器装配与生命周期

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskmesh_core::ExecutorConfig;
use taskmesh_domain::AdminClient;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::callback::{CallbackDispatcher, CallbackSettings};
use crate::executor_biz::ExecutorBiz;
use crate::handler::HandlerRegistry;
use crate::heartbeat::HeartbeatRegistrar;
use crate::job_worker::WorkerSettings;
use crate::log_file::JobFileAppender;
use crate::worker_registry::WorkerRegistry;

const LOG_CLEAN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct JobExecutor {
    config: ExecutorConfig,
    address: String,
    appender: Arc<JobFileAppender>,
    callback: Arc<CallbackDispatcher>,
    workers: Arc<WorkerRegistry>,
    biz: Arc<ExecutorBiz>,
    heartbeat: Arc<HeartbeatRegistrar>,
    stop: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobExecutor {
    pub fn new(
        config: ExecutorConfig,
        handlers: Arc<HandlerRegistry>,
        admins: Vec<Arc<dyn AdminClient>>,
    ) -> Self {
        let address = resolve_address(&config);
        let appender = Arc::new(JobFileAppender::new(&config.log_path));
        let callback = Arc::new(CallbackDispatcher::new(
            admins.clone(),
            appender.clone(),
            CallbackSettings {
                retry_attempts: config.callback_retry_attempts,
                retry_delay: config.callback_retry_delay(),
                retry_interval: config.beat_interval(),
            },
        ));
        let workers = WorkerRegistry::new(
            callback.clone(),
            appender.clone(),
            WorkerSettings {
                poll_wait: config.poll_wait(),
                idle_limit: config.idle_limit,
            },
        );
        let biz = Arc::new(ExecutorBiz::new(handlers, workers.clone(), appender.clone()));
        let heartbeat = Arc::new(HeartbeatRegistrar::new(
            admins,
            config.app_name.clone(),
            address.clone(),
            config.beat_interval(),
        ));

        Self {
            config,
            address,
            appender,
            callback,
            workers,
            biz,
            heartbeat,
            stop: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// 注册到调度中心的地址
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn biz(&self) -> Arc<ExecutorBiz> {
        self.biz.clone()
    }

    pub fn workers(&self) -> Arc<WorkerRegistry> {
        self.workers.clone()
    }

    /// 启动回调、心跳与日志清理任务
    pub fn start(&self) {
        self.callback.start();

        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = self.heartbeat.clone().start(self.stop.clone()) {
            tasks.push(handle);
        }

        let appender = self.appender.clone();
        let retention_days = self.config.log_retention_days;
        let stop = self.stop.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOG_CLEAN_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = appender.clean_expired(retention_days).await {
                            warn!("清理过期任务日志失败: {}", e);
                        }
                    }
                    _ = stop.cancelled() => break,
                }
            }
        }));

        info!(
            "执行器已启动, appName={}, address={}, logPath={}",
            self.config.app_name, self.address, self.config.log_path
        );
    }

    /// 注销、终止任务线程并投递剩余回调
    pub async fn stop(&self, timeout: Duration) {
        info!("正在停止执行器...");
        self.stop.cancel();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("执行器后台任务异常退出: {}", e);
            }
        }

        self.workers.shutdown(timeout).await;
        self.callback.stop().await;
        info!("执行器已停止");
    }
}

/// 未显式配置地址时，由本机主机名与监听端口组成
pub fn resolve_address(config: &ExecutorConfig) -> String {
    if let Some(address) = config
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        return address.to_string();
    }

    let port = config
        .bind_address
        .rsplit(':')
        .next()
        .unwrap_or("9999")
        .to_string();
    let host = config
        .bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .filter(|host| !host.is_empty() && *host != "0.0.0.0")
        .map(str::to_string)
        .or_else(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
        })
        .unwrap_or_else(|| "127.0.0.1".to_string());
    format!("http://{host}:{port}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_address() {
        let mut config = ExecutorConfig {
            bind_address: "10.0.0.5:9999".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_address(&config), "http://10.0.0.5:9999/");

        config.address = Some("http://custom:1234/".to_string());
        assert_eq!(resolve_address(&config), "http://custom:1234/");

        config.address = None;
        config.bind_address = "0.0.0.0:9998".to_string();
        let derived = resolve_address(&config);
        assert!(derived.starts_with("http://"));
        assert!(derived.ends_with(":9998/"));
    }
}
