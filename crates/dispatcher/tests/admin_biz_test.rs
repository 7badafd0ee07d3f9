use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mockall::mock;
use mockall::predicate::function;
use taskmesh_core::SchedulerResult;
use taskmesh_dispatcher::{
    AdminBiz, CompletionHandler, RegistryMonitor, TriggerRequest, TriggerSubmitter,
};
use taskmesh_domain::{
    ExecutorGroupRepository, HandleCallbackParam, JobLog, JobLogRepository, JobRepository,
    RegistryParam, RegistryRepository, TriggerType, FAIL_CODE, SUCCESS_CODE,
};
use taskmesh_infrastructure::{
    InMemoryExecutorGroupRepository, InMemoryJobLogRepository, InMemoryJobRepository,
    InMemoryRegistryRepository,
};
use taskmesh_testing_utils::{ExecutorGroupBuilder, JobDefinitionBuilder};

mock! {
    pub Submitter {}

    impl TriggerSubmitter for Submitter {
        fn submit(&self, request: TriggerRequest) -> SchedulerResult<()>;
    }
}

struct Fixture {
    jobs: Arc<InMemoryJobRepository>,
    groups: Arc<InMemoryExecutorGroupRepository>,
    logs: Arc<InMemoryJobLogRepository>,
    registry: Arc<InMemoryRegistryRepository>,
    biz: AdminBiz,
}

fn fixture(submitter: MockSubmitter) -> Fixture {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let groups = Arc::new(InMemoryExecutorGroupRepository::new());
    let logs = Arc::new(InMemoryJobLogRepository::new());
    let registry = Arc::new(InMemoryRegistryRepository::new());
    let completion = Arc::new(CompletionHandler::new(
        jobs.clone(),
        logs.clone(),
        Arc::new(submitter),
    ));
    let registry_monitor = Arc::new(RegistryMonitor::new(
        groups.clone(),
        registry.clone(),
        Duration::from_secs(30),
        Duration::from_secs(90),
    ));
    let biz = AdminBiz::new(logs.clone(), registry.clone(), completion, registry_monitor);
    Fixture {
        jobs,
        groups,
        logs,
        registry,
        biz,
    }
}

async fn triggered_log(logs: &InMemoryJobLogRepository, job_id: i64) -> JobLog {
    let mut log = logs.create(&JobLog::pending(1, job_id, Utc::now())).await.unwrap();
    log.trigger_code = SUCCESS_CODE;
    log.executor_address = Some("http://a:9999".to_string());
    logs.update_trigger_info(&log).await.unwrap();
    log
}

#[tokio::test]
async fn test_success_callback_triggers_child_jobs() {
    let mut submitter = MockSubmitter::new();
    submitter
        .expect_submit()
        .with(function(|r: &TriggerRequest| r.trigger_type == TriggerType::Parent))
        .times(2)
        .returning(|_| Ok(()));
    let f = fixture(submitter);
    f.jobs
        .save(&JobDefinitionBuilder::new().with_children("2,abc,3").build())
        .await
        .unwrap();
    let log = triggered_log(&f.logs, 1).await;

    let result = f
        .biz
        .callback(vec![HandleCallbackParam::new(
            log.id,
            log.trigger_date_time_millis(),
            SUCCESS_CODE,
            Some("done".to_string()),
        )])
        .await;
    assert!(result.is_success());

    let stored = f.logs.find_by_id(log.id).await.unwrap().unwrap();
    assert_eq!(stored.handle_code, SUCCESS_CODE);
    let msg = stored.handle_msg.unwrap();
    assert!(msg.starts_with("done"));
    assert!(msg.contains(">>>>>>>>>>>触发子任务<<<<<<<<<<<"));
    assert!(msg.contains("1/3 [任务ID=2], 触发成功"));
    assert!(msg.contains("2/3 [任务ID=abc], 触发失败, 触发备注: 任务ID格式错误"));
    assert!(msg.contains("3/3 [任务ID=3], 触发成功"));
}

#[tokio::test]
async fn test_blank_child_id_is_reported_as_invalid() {
    let mut submitter = MockSubmitter::new();
    submitter.expect_submit().times(2).returning(|_| Ok(()));
    let f = fixture(submitter);
    f.jobs
        .save(&JobDefinitionBuilder::new().with_children("2,,3").build())
        .await
        .unwrap();
    let log = triggered_log(&f.logs, 1).await;

    f.biz
        .callback(vec![HandleCallbackParam::new(
            log.id,
            log.trigger_date_time_millis(),
            SUCCESS_CODE,
            None,
        )])
        .await;

    let msg = f.logs.find_by_id(log.id).await.unwrap().unwrap().handle_msg.unwrap();
    assert!(msg.contains("1/3 [任务ID=2], 触发成功"));
    assert!(msg.contains("2/3 [任务ID=], 触发失败, 触发备注: 任务ID格式错误"));
    assert!(msg.contains("3/3 [任务ID=3], 触发成功"));
}

#[tokio::test]
async fn test_failed_callback_does_not_trigger_children() {
    let mut submitter = MockSubmitter::new();
    submitter.expect_submit().times(0);
    let f = fixture(submitter);
    f.jobs
        .save(&JobDefinitionBuilder::new().with_children("2").build())
        .await
        .unwrap();
    let log = triggered_log(&f.logs, 1).await;

    f.biz
        .callback(vec![HandleCallbackParam::new(
            log.id,
            0,
            FAIL_CODE,
            Some("boom".to_string()),
        )])
        .await;

    let stored = f.logs.find_by_id(log.id).await.unwrap().unwrap();
    assert_eq!(stored.handle_code, FAIL_CODE);
    assert_eq!(stored.handle_msg.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_repeated_callback_keeps_first_result() {
    let f = fixture(MockSubmitter::new());
    f.jobs.save(&JobDefinitionBuilder::new().build()).await.unwrap();
    let log = triggered_log(&f.logs, 1).await;

    let first = HandleCallbackParam::new(log.id, 0, SUCCESS_CODE, Some("first".to_string()));
    let second = HandleCallbackParam::new(log.id, 0, FAIL_CODE, Some("second".to_string()));
    let unknown = HandleCallbackParam::new(9999, 0, SUCCESS_CODE, None);
    let result = f.biz.callback(vec![first, second, unknown]).await;
    assert!(result.is_success());

    let stored = f.logs.find_by_id(log.id).await.unwrap().unwrap();
    assert_eq!(stored.handle_code, SUCCESS_CODE);
    assert_eq!(stored.handle_msg.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_registry_validates_fields() {
    let f = fixture(MockSubmitter::new());
    let result = f
        .biz
        .registry(RegistryParam::new("EXECUTOR", " ", "http://a:9999"))
        .await;
    assert!(!result.is_success());
    assert_eq!(result.msg.as_deref(), Some("Illegal Argument."));
    assert!(f.registry.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_refreshes_auto_group_addresses() {
    let f = fixture(MockSubmitter::new());
    f.groups
        .save(&ExecutorGroupBuilder::new().with_app_name("demo").build())
        .await
        .unwrap();

    for address in ["http://b:9999", "http://a:9999"] {
        let result = f
            .biz
            .registry(RegistryParam::new("EXECUTOR", "demo", address))
            .await;
        assert!(result.is_success());
    }
    let group = f.groups.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(
        group.address_list.as_deref(),
        Some("http://a:9999,http://b:9999")
    );

    f.biz
        .registry_remove(RegistryParam::new("EXECUTOR", "demo", "http://a:9999"))
        .await;
    let group = f.groups.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(group.address_list.as_deref(), Some("http://b:9999"));
}

#[tokio::test]
async fn test_manual_group_is_not_refreshed() {
    let f = fixture(MockSubmitter::new());
    f.groups
        .save(
            &ExecutorGroupBuilder::new()
                .with_app_name("demo")
                .with_addresses(&["http://fixed:9999"])
                .build(),
        )
        .await
        .unwrap();

    f.biz
        .registry(RegistryParam::new("EXECUTOR", "demo", "http://a:9999"))
        .await;
    let group = f.groups.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(group.address_list.as_deref(), Some("http://fixed:9999"));
}
