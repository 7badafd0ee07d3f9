use chrono::{Duration, Utc};
use taskmesh_domain::{
    ExecutorGroup, ExecutorGroupRepository, JobDefinition, JobLog, JobLogRepository,
    JobRepository, RegistryRepository, ALARM_STATUS_DEFAULT, ALARM_STATUS_LOCKED, SUCCESS_CODE,
};
use taskmesh_infrastructure::{
    BootstrapData, InMemoryExecutorGroupRepository, InMemoryJobLogRepository,
    InMemoryJobRepository, InMemoryRegistryRepository,
};

#[tokio::test]
async fn test_job_repository_assigns_ids_after_explicit_ones() {
    let repo = InMemoryJobRepository::new();
    let explicit = repo
        .save(&JobDefinition {
            id: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    let generated = repo.save(&JobDefinition::default()).await.unwrap();

    assert_eq!(explicit.id, 10);
    assert_eq!(generated.id, 11);
    assert_eq!(repo.find_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_find_schedulable_filters_by_status_and_time() {
    let repo = InMemoryJobRepository::new();
    for (id, status, next) in [(1, true, 100), (2, false, 100), (3, true, 900)] {
        repo.save(&JobDefinition {
            id,
            trigger_status: status,
            trigger_next_time: next,
            ..Default::default()
        })
        .await
        .unwrap();
    }

    let due = repo.find_schedulable(500).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, 1);

    repo.update_schedule(1, 100, 1000, true).await.unwrap();
    assert!(repo.find_schedulable(500).await.unwrap().is_empty());
    assert!(repo.update_schedule(99, 0, 0, false).await.is_err());
}

#[tokio::test]
async fn test_job_log_alarm_status_cas() {
    let repo = InMemoryJobLogRepository::new();
    let mut log = JobLog::pending(1, 1, Utc::now());
    log.trigger_code = 500;
    let log = repo.create(&log).await.unwrap();

    let ids = repo.find_fail_log_ids(100).await.unwrap();
    assert_eq!(ids, vec![log.id]);

    assert!(repo
        .update_alarm_status(log.id, ALARM_STATUS_DEFAULT, ALARM_STATUS_LOCKED)
        .await
        .unwrap());
    assert!(!repo
        .update_alarm_status(log.id, ALARM_STATUS_DEFAULT, ALARM_STATUS_LOCKED)
        .await
        .unwrap());
    assert!(repo.find_fail_log_ids(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_lost_candidates() {
    let repo = InMemoryJobLogRepository::new();
    let old = Utc::now() - Duration::minutes(20);

    let mut pending = JobLog::pending(1, 1, old);
    pending.trigger_code = SUCCESS_CODE;
    let pending = repo.create(&pending).await.unwrap();

    let mut finished = JobLog::pending(1, 1, old);
    finished.trigger_code = SUCCESS_CODE;
    finished.handle_code = SUCCESS_CODE;
    repo.create(&finished).await.unwrap();

    let mut recent = JobLog::pending(1, 1, Utc::now());
    recent.trigger_code = SUCCESS_CODE;
    repo.create(&recent).await.unwrap();

    let lost = repo
        .find_lost_candidates(Utc::now() - Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].id, pending.id);
}

#[tokio::test]
async fn test_registry_upsert_and_remove_dead() {
    let repo = InMemoryRegistryRepository::new();
    let stale = Utc::now() - Duration::seconds(120);

    repo.upsert("EXECUTOR", "app", "http://a:9999/", stale).await.unwrap();
    repo.upsert("EXECUTOR", "app", "http://b:9999/", Utc::now()).await.unwrap();
    repo.upsert("EXECUTOR", "app", "http://b:9999/", Utc::now()).await.unwrap();
    assert_eq!(repo.find_all().await.unwrap().len(), 2);

    let removed = repo
        .remove_dead(Utc::now() - Duration::seconds(90))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let remaining = repo.find_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].registry_value, "http://b:9999/");

    assert!(repo.remove("EXECUTOR", "app", "http://b:9999/").await.unwrap());
    assert!(!repo.remove("EXECUTOR", "app", "http://b:9999/").await.unwrap());
}

#[tokio::test]
async fn test_bootstrap_apply() {
    let json = r#"{
        "groups": [{"id": 1, "app_name": "sample", "title": "示例执行器", "address_type": "MANUAL",
                    "address_list": "http://127.0.0.1:9999/"}],
        "jobs": [{"id": 5, "job_group": 1, "executor_handler": "demoJobHandler",
                  "executor_route_strategy": "ROUND", "child_job_id": "6"}]
    }"#;
    let data = BootstrapData::from_json(json).unwrap();
    let groups = InMemoryExecutorGroupRepository::new();
    let jobs = InMemoryJobRepository::new();
    data.apply(&groups, &jobs).await.unwrap();

    let group = groups.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(group.registry_list(), vec!["http://127.0.0.1:9999/"]);
    let job = jobs.find_by_id(5).await.unwrap().unwrap();
    assert_eq!(job.executor_handler, "demoJobHandler");
    assert_eq!(job.child_job_ids(), vec!["6"]);
}

#[tokio::test]
async fn test_bootstrap_rejects_unknown_group() {
    let data = BootstrapData {
        groups: vec![ExecutorGroup::default()],
        jobs: vec![JobDefinition {
            id: 1,
            job_group: 42,
            ..Default::default()
        }],
    };
    let groups = InMemoryExecutorGroupRepository::new();
    let jobs = InMemoryJobRepository::new();
    assert!(data.apply(&groups, &jobs).await.is_err());
}
