use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mockall::mock;
use serde_json::{json, Value};
use taskmesh_api::{admin_router, AdminState};
use taskmesh_core::SchedulerResult;
use taskmesh_dispatcher::{
    AdminBiz, CompletionHandler, RegistryMonitor, TriggerRequest, TriggerSubmitter,
};
use taskmesh_domain::{JobRepository, RegistryRepository, TriggerType, ACCESS_TOKEN_HEADER};
use taskmesh_infrastructure::{
    InMemoryExecutorGroupRepository, InMemoryJobLogRepository, InMemoryJobRepository,
    InMemoryRegistryRepository,
};
use taskmesh_testing_utils::JobDefinitionBuilder;
use tower::ServiceExt;

mock! {
    pub Submitter {}

    impl TriggerSubmitter for Submitter {
        fn submit(&self, request: TriggerRequest) -> SchedulerResult<()>;
    }
}

struct Fixture {
    jobs: Arc<InMemoryJobRepository>,
    registry: Arc<InMemoryRegistryRepository>,
    app: Router,
}

fn fixture(submitter: MockSubmitter, access_token: Option<&str>) -> Fixture {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let groups = Arc::new(InMemoryExecutorGroupRepository::new());
    let logs = Arc::new(InMemoryJobLogRepository::new());
    let registry = Arc::new(InMemoryRegistryRepository::new());
    let submitter: Arc<dyn TriggerSubmitter> = Arc::new(submitter);
    let completion = Arc::new(CompletionHandler::new(
        jobs.clone(),
        logs.clone(),
        submitter.clone(),
    ));
    let registry_monitor = Arc::new(RegistryMonitor::new(
        groups,
        registry.clone(),
        Duration::from_secs(30),
        Duration::from_secs(90),
    ));
    let biz = Arc::new(AdminBiz::new(logs, registry.clone(), completion, registry_monitor));
    let app = admin_router(AdminState {
        biz,
        jobs: jobs.clone(),
        trigger: submitter,
        access_token: access_token.map(str::to_string),
    });
    Fixture {
        jobs,
        registry,
        app,
    }
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn registry_body() -> Value {
    json!({
        "registryGroup": "EXECUTOR",
        "registryKey": "demo",
        "registryValue": "http://127.0.0.1:9999/"
    })
}

#[tokio::test]
async fn test_registry_and_remove() {
    let f = fixture(MockSubmitter::new(), None);

    let (status, body) = send(&f.app, post("/api/registry", registry_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    let entries = f.registry.find_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].registry_key, "demo");

    let (_, body) = send(&f.app, post("/api/registryRemove", registry_body())).await;
    assert_eq!(body["code"], 200);
    assert!(f.registry.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transport_rejections() {
    let f = fixture(MockSubmitter::new(), None);

    let get = Request::builder()
        .method("GET")
        .uri("/api/registry")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&f.app, get).await;
    assert_eq!(body["code"], 500);
    assert_eq!(body["msg"], "invalid request, HttpMethod not support.");

    let (_, body) = send(&f.app, post("/api/", json!({}))).await;
    assert_eq!(body["msg"], "invalid request, uri-mapping empty.");

    let (_, body) = send(&f.app, post("/api/unknown", json!({}))).await;
    assert_eq!(body["msg"], "invalid request, uri-mapping(unknown) not found.");

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/registry")
        .body(Body::from("{not json"))
        .unwrap();
    let (_, body) = send(&f.app, malformed).await;
    assert_eq!(body["code"], 500);
    assert!(f.registry.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_access_token_is_checked() {
    let f = fixture(MockSubmitter::new(), Some("secret"));

    let (_, body) = send(&f.app, post("/api/registry", registry_body())).await;
    assert_eq!(body["msg"], "The access token is wrong.");

    let mut request = post("/api/registry", registry_body());
    request
        .headers_mut()
        .insert(ACCESS_TOKEN_HEADER, "secret".parse().unwrap());
    let (_, body) = send(&f.app, request).await;
    assert_eq!(body["code"], 200);
}

#[tokio::test]
async fn test_callback_for_unknown_log_still_succeeds() {
    let f = fixture(MockSubmitter::new(), None);
    let (_, body) = send(
        &f.app,
        post(
            "/api/callback",
            json!([{ "logId": 404, "logDateTim": 0, "handleCode": 200 }]),
        ),
    )
    .await;
    assert_eq!(body["code"], 200);
}

#[tokio::test]
async fn test_manual_trigger_submits_request() {
    let mut submitter = MockSubmitter::new();
    submitter
        .expect_submit()
        .withf(|r| {
            r.job_id == 1
                && r.trigger_type == TriggerType::Manual
                && r.executor_param.as_deref() == Some("override")
        })
        .times(1)
        .returning(|_| Ok(()));
    let f = fixture(submitter, None);
    f.jobs.save(&JobDefinitionBuilder::new().build()).await.unwrap();

    let (_, body) = send(
        &f.app,
        post("/jobs/1/trigger", json!({ "executorParam": "override" })),
    )
    .await;
    assert_eq!(body["code"], 200);

    let (_, body) = send(&f.app, post("/jobs/99/trigger", json!({}))).await;
    assert_eq!(body["code"], 500);
}

#[tokio::test]
async fn test_health() {
    let f = fixture(MockSubmitter::new(), None);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "taskmesh-admin");
}
