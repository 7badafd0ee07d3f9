//! 调度中心与执行器在同一进程内通过真实 HTTP 交互

use std::sync::Arc;
use std::time::Duration;

use taskmesh::handlers::builtin_handlers;
use taskmesh_api::{admin_router, executor_router, AdminState, ExecutorState};
use taskmesh_core::ExecutorConfig;
use taskmesh_dispatcher::{
    AdminBiz, CompletionHandler, ExecutorRouter, JobTriggerPool, RegistryMonitor,
    TriggerDispatcher, TriggerRequest, TriggerSubmitter,
};
use taskmesh_domain::{
    AdminClient, ExecutorClientFactory, ExecutorGroupRepository, JobLog, JobLogRepository,
    JobRepository, TriggerType, SUCCESS_CODE,
};
use taskmesh_executor::JobExecutor;
use taskmesh_infrastructure::{
    ExecutorClientPool, HttpAdminClient, InMemoryExecutorGroupRepository,
    InMemoryJobLogRepository, InMemoryJobRepository, InMemoryRegistryRepository,
};
use taskmesh_testing_utils::{ExecutorGroupBuilder, JobDefinitionBuilder};
use tempfile::TempDir;
use tokio::net::TcpListener;

const TOKEN: &str = "e2e-token";

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    (listener, address)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_trigger_runs_on_registered_executor_and_calls_back() {
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
    let groups: Arc<dyn ExecutorGroupRepository> = Arc::new(InMemoryExecutorGroupRepository::new());
    let logs: Arc<dyn JobLogRepository> = Arc::new(InMemoryJobLogRepository::new());
    let registry = Arc::new(InMemoryRegistryRepository::new());

    groups
        .save(&ExecutorGroupBuilder::new().with_app_name("e2e").build())
        .await
        .unwrap();
    jobs.save(&JobDefinitionBuilder::new().with_param("from-admin").build())
        .await
        .unwrap();

    let (admin_listener, admin_address) = bind().await;
    let clients: Arc<dyn ExecutorClientFactory> = Arc::new(ExecutorClientPool::new(
        Some(TOKEN.to_string()),
        Duration::from_secs(3),
    ));
    let dispatcher = Arc::new(TriggerDispatcher::new(
        jobs.clone(),
        groups.clone(),
        logs.clone(),
        Arc::new(ExecutorRouter::new(clients.clone())),
        clients,
        admin_address.clone(),
    ));
    let trigger: Arc<dyn TriggerSubmitter> =
        Arc::new(JobTriggerPool::new(dispatcher.clone(), 10, 10));
    let registry_monitor = Arc::new(RegistryMonitor::new(
        groups.clone(),
        registry.clone(),
        Duration::from_secs(30),
        Duration::from_secs(90),
    ));
    let completion = Arc::new(CompletionHandler::new(
        jobs.clone(),
        logs.clone(),
        trigger.clone(),
    ));
    let biz = Arc::new(AdminBiz::new(
        logs.clone(),
        registry,
        completion,
        registry_monitor,
    ));
    let admin_app = admin_router(AdminState {
        biz,
        jobs: jobs.clone(),
        trigger,
        access_token: Some(TOKEN.to_string()),
    });
    tokio::spawn(async move { axum::serve(admin_listener, admin_app).await });

    let dir = TempDir::new().unwrap();
    let (executor_listener, executor_address) = bind().await;
    let config = ExecutorConfig {
        app_name: "e2e".to_string(),
        address: Some(format!("{executor_address}/")),
        admin_addresses: vec![admin_address.clone()],
        access_token: TOKEN.to_string(),
        log_path: dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };
    let admin_client: Arc<dyn AdminClient> = Arc::new(
        HttpAdminClient::new(admin_address, Some(TOKEN.to_string()), Duration::from_secs(3))
            .unwrap(),
    );
    let executor = JobExecutor::new(config, builtin_handlers().unwrap(), vec![admin_client]);
    let executor_app = executor_router(ExecutorState {
        biz: executor.biz(),
        access_token: Some(TOKEN.to_string()),
    });
    tokio::spawn(async move { axum::serve(executor_listener, executor_app).await });
    executor.start();

    // 心跳注册后分组地址自动刷新
    wait_until(|| {
        let groups = groups.clone();
        async move {
            groups
                .find_by_id(1)
                .await
                .unwrap()
                .and_then(|group| group.address_list)
                .is_some()
        }
    })
    .await;

    let log_ids = dispatcher
        .trigger(TriggerRequest::new(1, TriggerType::Manual))
        .await;
    assert_eq!(log_ids.len(), 1);
    let log_id = log_ids[0];

    wait_until(|| {
        let logs = logs.clone();
        async move {
            logs.find_by_id(log_id)
                .await
                .unwrap()
                .map(|log: JobLog| log.handle_code != 0)
                .unwrap_or(false)
        }
    })
    .await;

    let log = logs.find_by_id(log_id).await.unwrap().unwrap();
    assert_eq!(log.trigger_code, SUCCESS_CODE);
    assert_eq!(log.handle_code, SUCCESS_CODE);
    assert_eq!(log.executor_address.as_deref(), Some(format!("{executor_address}/").as_str()));
    assert_eq!(log.executor_param.as_deref(), Some("from-admin"));

    executor.stop(Duration::from_secs(5)).await;
}
