use std::sync::{Arc, Mutex};

use chrono::Utc;
use taskmesh_core::SchedulerResult;
use taskmesh_dispatcher::{JobScheduler, TriggerRequest, TriggerSubmitter};
use taskmesh_domain::{JobDefinition, JobRepository, MisfireStrategy, ScheduleType, TriggerType};
use taskmesh_infrastructure::InMemoryJobRepository;
use taskmesh_testing_utils::JobDefinitionBuilder;

#[derive(Default)]
struct RecordingSubmitter {
    requests: Mutex<Vec<TriggerRequest>>,
}

impl RecordingSubmitter {
    fn trigger_types(&self) -> Vec<TriggerType> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.trigger_type)
            .collect()
    }
}

impl TriggerSubmitter for RecordingSubmitter {
    fn submit(&self, request: TriggerRequest) -> SchedulerResult<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

fn fix_rate_job(seconds: &str, next_time: i64) -> JobDefinition {
    let mut job = JobDefinitionBuilder::new().build();
    job.schedule_type = ScheduleType::FixRate;
    job.schedule_conf = Some(seconds.to_string());
    job.trigger_status = true;
    job.trigger_next_time = next_time;
    job
}

async fn setup(job: JobDefinition) -> (Arc<InMemoryJobRepository>, Arc<RecordingSubmitter>, JobScheduler) {
    let jobs = Arc::new(InMemoryJobRepository::new());
    jobs.save(&job).await.unwrap();
    let submitter = Arc::new(RecordingSubmitter::default());
    let scheduler = JobScheduler::new(jobs.clone(), submitter.clone());
    (jobs, submitter, scheduler)
}

#[tokio::test]
async fn test_first_pass_initializes_next_time_without_trigger() {
    let now = Utc::now().timestamp_millis();
    let (jobs, submitter, scheduler) =
        setup(JobDefinitionBuilder::new().with_cron("0 0 * * * ?").build()).await;

    scheduler.pre_read_once(now).await.unwrap();

    assert!(submitter.trigger_types().is_empty());
    let job = jobs.find_by_id(1).await.unwrap().unwrap();
    assert!(job.trigger_next_time > now);
    assert!(job.trigger_status);
}

#[tokio::test]
async fn test_due_job_triggers_and_advances() {
    let now = Utc::now().timestamp_millis();
    let (jobs, submitter, scheduler) = setup(fix_rate_job("60", now - 1000)).await;

    scheduler.pre_read_once(now).await.unwrap();

    assert_eq!(submitter.trigger_types(), vec![TriggerType::Cron]);
    let job = jobs.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(job.trigger_next_time, now + 60_000);
    assert_eq!(job.trigger_last_time, now - 1000);
}

#[tokio::test]
async fn test_misfire_do_nothing_skips_trigger() {
    let now = Utc::now().timestamp_millis();
    let (jobs, submitter, scheduler) = setup(fix_rate_job("60", now - 30_000)).await;

    scheduler.pre_read_once(now).await.unwrap();

    assert!(submitter.trigger_types().is_empty());
    let job = jobs.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(job.trigger_next_time, now + 60_000);
}

#[tokio::test]
async fn test_misfire_fire_once_now() {
    let now = Utc::now().timestamp_millis();
    let mut job = fix_rate_job("60", now - 30_000);
    job.misfire_strategy = MisfireStrategy::FireOnceNow;
    let (_, submitter, scheduler) = setup(job).await;

    scheduler.pre_read_once(now).await.unwrap();

    assert_eq!(submitter.trigger_types(), vec![TriggerType::Misfire]);
}

#[tokio::test]
async fn test_upcoming_job_waits_in_ring() {
    let now = Utc::now().timestamp_millis();
    let (jobs, submitter, scheduler) = setup(fix_rate_job("60", now + 3000)).await;

    scheduler.pre_read_once(now).await.unwrap();
    assert!(submitter.trigger_types().is_empty());
    assert_eq!(scheduler.ring_size().await, 1);

    assert_eq!(scheduler.drain_ring(now).await, 0);
    assert_eq!(scheduler.drain_ring(now + 3000).await, 1);
    assert_eq!(submitter.trigger_types(), vec![TriggerType::Cron]);
    assert_eq!(scheduler.ring_size().await, 0);

    let job = jobs.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(job.trigger_next_time, now + 63_000);
}

#[tokio::test]
async fn test_fast_fix_rate_job_also_queues_next_fire() {
    let now = Utc::now().timestamp_millis();
    let (_, submitter, scheduler) = setup(fix_rate_job("1", now)).await;

    scheduler.pre_read_once(now).await.unwrap();

    assert_eq!(submitter.trigger_types(), vec![TriggerType::Cron]);
    assert_eq!(scheduler.ring_size().await, 1);
}

#[tokio::test]
async fn test_invalid_schedule_stops_job() {
    let now = Utc::now().timestamp_millis();
    let mut job = JobDefinitionBuilder::new().with_cron("bad cron").build();
    job.trigger_next_time = now - 1000;
    let (jobs, submitter, scheduler) = setup(job).await;

    scheduler.pre_read_once(now).await.unwrap();

    // 到期的那一次仍会触发，之后停止调度
    assert_eq!(submitter.trigger_types(), vec![TriggerType::Cron]);
    let job = jobs.find_by_id(1).await.unwrap().unwrap();
    assert!(!job.trigger_status);
    assert_eq!(job.trigger_next_time, 0);
}
