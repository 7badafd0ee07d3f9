use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use taskmesh_api::{admin_router, executor_router, with_http_layers, AdminState, ExecutorState};
use taskmesh_core::AppConfig;
use taskmesh_dispatcher::{
    AdminBiz, CompletionHandler, ExecutorRouter, JobFailMonitor, JobScheduler, JobTriggerPool,
    LostResultMonitor, RegistryMonitor, TriggerDispatcher, TriggerSubmitter,
};
use taskmesh_domain::{
    AdminClient, ExecutorClientFactory, ExecutorGroupRepository, JobLogRepository, JobRepository,
    RegistryRepository,
};
use taskmesh_executor::{HandlerRegistry, JobExecutor};
use taskmesh_infrastructure::{
    BootstrapData, ExecutorClientPool, HttpAdminClient, InMemoryExecutorGroupRepository,
    InMemoryJobLogRepository, InMemoryJobRepository, InMemoryRegistryRepository,
};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

/// 关闭时等待在途触发与任务线程的时间
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行调度中心
    Admin,
    /// 仅运行执行器
    Executor,
    /// 同一进程内运行调度中心与执行器
    All,
}

impl AppMode {
    pub fn parse(mode: &str, config: &AppConfig) -> Result<Self> {
        match mode {
            "admin" => {
                if !config.admin.enabled {
                    return Err(anyhow::anyhow!("调度中心模式被禁用，请检查配置"));
                }
                Ok(AppMode::Admin)
            }
            "executor" => {
                if !config.executor.enabled {
                    return Err(anyhow::anyhow!("执行器模式被禁用，请检查配置"));
                }
                Ok(AppMode::Executor)
            }
            "all" => Ok(AppMode::All),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {mode}")),
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    handlers: Arc<HandlerRegistry>,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode, handlers: Arc<HandlerRegistry>) -> Self {
        info!(
            "初始化应用程序，模式: {:?}，已注册处理器: {:?}",
            mode,
            handlers.names()
        );
        Self {
            config,
            mode,
            handlers,
        }
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);
        match self.mode {
            AppMode::Admin => self.run_admin(shutdown_rx).await,
            AppMode::Executor => self.run_executor(shutdown_rx).await,
            AppMode::All => self.run_all(shutdown_rx).await,
        }
    }

    /// 运行调度中心
    async fn run_admin(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let admin = &self.config.admin;
        info!("启动调度中心: {}", admin.bind_address);

        let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let groups: Arc<dyn ExecutorGroupRepository> =
            Arc::new(InMemoryExecutorGroupRepository::new());
        let logs: Arc<dyn JobLogRepository> = Arc::new(InMemoryJobLogRepository::new());
        let registry: Arc<dyn RegistryRepository> = Arc::new(InMemoryRegistryRepository::new());

        if let Some(path) = &admin.bootstrap_file {
            let data = BootstrapData::load_file(path)
                .await
                .with_context(|| format!("加载初始化文件失败: {path}"))?;
            data.apply(groups.as_ref(), jobs.as_ref())
                .await
                .context("导入初始化数据失败")?;
        }

        let access_token = admin.access_token().map(str::to_string);
        let clients: Arc<dyn ExecutorClientFactory> = Arc::new(ExecutorClientPool::new(
            access_token.clone(),
            admin.rpc_timeout(),
        ));
        let dispatcher = Arc::new(TriggerDispatcher::new(
            jobs.clone(),
            groups.clone(),
            logs.clone(),
            Arc::new(ExecutorRouter::new(clients.clone())),
            clients,
            admin.public_address.clone(),
        ));
        let pool = Arc::new(JobTriggerPool::new(
            dispatcher,
            admin.trigger_pool_fast_max,
            admin.trigger_pool_slow_max,
        ));
        let trigger: Arc<dyn TriggerSubmitter> = pool.clone();

        let registry_monitor = Arc::new(RegistryMonitor::new(
            groups,
            registry.clone(),
            admin.beat_interval(),
            admin.dead_timeout(),
        ));
        let completion = Arc::new(CompletionHandler::new(
            jobs.clone(),
            logs.clone(),
            trigger.clone(),
        ));
        let biz = Arc::new(AdminBiz::new(
            logs.clone(),
            registry,
            completion.clone(),
            registry_monitor.clone(),
        ));
        let monitor_interval = Duration::from_secs(admin.fail_monitor_interval_seconds);
        let fail_monitor = Arc::new(JobFailMonitor::new(
            jobs.clone(),
            logs.clone(),
            trigger.clone(),
            monitor_interval,
        ));
        let lost_monitor = Arc::new(LostResultMonitor::new(
            logs,
            completion,
            registry_monitor.clone(),
            Duration::from_secs(admin.lost_result_minutes as u64 * 60),
            monitor_interval,
        ));

        let mut handles: Vec<JoinHandle<()>> = vec![
            tokio::spawn(registry_monitor.start(shutdown_rx.resubscribe())),
            tokio::spawn(fail_monitor.start(shutdown_rx.resubscribe())),
            tokio::spawn(lost_monitor.start(shutdown_rx.resubscribe())),
        ];
        if admin.schedule_enabled {
            let scheduler = Arc::new(JobScheduler::new(jobs.clone(), trigger.clone()));
            handles.push(tokio::spawn(scheduler.start(shutdown_rx.resubscribe())));
        } else {
            warn!("调度循环已禁用，任务只能手动触发");
        }

        let app = with_http_layers(admin_router(AdminState {
            biz,
            jobs,
            trigger,
            access_token,
        }));
        handles.push(serve("调度中心", &admin.bind_address, app, shutdown_rx.resubscribe()).await?);

        let _ = shutdown_rx.recv().await;
        info!("调度中心收到关闭信号");

        for handle in handles {
            if let Err(e) = handle.await {
                error!("调度中心后台任务异常退出: {}", e);
            }
        }
        pool.shutdown(DRAIN_TIMEOUT).await;

        info!("调度中心已停止");
        Ok(())
    }

    /// 运行执行器
    async fn run_executor(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let config = &self.config.executor;
        info!("启动执行器: {}", config.app_name);

        let access_token = config.access_token().map(str::to_string);
        let admins = config
            .admin_addresses
            .iter()
            .filter(|address| !address.trim().is_empty())
            .map(|address| {
                HttpAdminClient::new(address.trim(), access_token.clone(), config.rpc_timeout())
                    .map(|client| Arc::new(client) as Arc<dyn AdminClient>)
                    .with_context(|| format!("创建调度中心客户端失败: {address}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let executor = JobExecutor::new(config.clone(), self.handlers.clone(), admins);
        let app = with_http_layers(executor_router(ExecutorState {
            biz: executor.biz(),
            access_token,
        }));
        let server = serve("执行器", &config.bind_address, app, shutdown_rx.resubscribe()).await?;
        executor.start();

        let _ = shutdown_rx.recv().await;
        info!("执行器收到关闭信号");

        executor.stop(DRAIN_TIMEOUT).await;
        if let Err(e) = server.await {
            error!("执行器HTTP服务异常退出: {}", e);
        }

        info!("执行器已停止");
        Ok(())
    }

    /// 运行所有组件
    async fn run_all(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");

        let admin = self.clone_for_mode(AppMode::Admin);
        let admin_rx = shutdown_rx.resubscribe();
        let admin_handle = tokio::spawn(async move {
            if let Err(e) = admin.run_admin(admin_rx).await {
                error!("调度中心运行失败: {:#}", e);
            }
        });

        let executor = self.clone_for_mode(AppMode::Executor);
        let executor_handle = tokio::spawn(async move {
            if let Err(e) = executor.run_executor(shutdown_rx).await {
                error!("执行器运行失败: {:#}", e);
            }
        });

        let _ = tokio::join!(admin_handle, executor_handle);
        info!("所有组件已停止");
        Ok(())
    }

    fn clone_for_mode(&self, mode: AppMode) -> Self {
        Self {
            config: self.config.clone(),
            mode,
            handlers: self.handlers.clone(),
        }
    }
}

/// 绑定地址并在后台提供 HTTP 服务，收到关闭信号后停止接收新连接
async fn serve(
    name: &'static str,
    bind_address: &str,
    app: axum::Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("绑定地址失败: {bind_address}"))?;
    info!("{}HTTP服务启动在 http://{}", name, bind_address);

    Ok(tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("{}HTTP服务运行失败: {}", name, e);
        }
    }))
}

/// 启用时安装 Prometheus 指标导出器
pub fn init_metrics(config: &AppConfig) -> Result<()> {
    let observability = &config.observability;
    if !observability.metrics_enabled {
        return Ok(());
    }

    let address: SocketAddr = observability
        .metrics_bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", observability.metrics_bind_address))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus指标导出器失败: {}", e))?;

    info!("Prometheus指标导出器已启动: http://{}/metrics", address);
    Ok(())
}
