use std::sync::Arc;
use std::time::Duration;

use ljs::config::JobSettings;
use ljs::error::JobError;
use ljs::manager::{JobManager, PollOutcome};
use ljs::models::{JobStatus, parse_elapsed, parse_job_id};
use ljs::store::MemoryStore;
use tokio_test::assert_ok;

fn settings() -> JobSettings {
  JobSettings {
    tick_interval: Duration::from_secs(5),
    work_duration: Duration::from_secs(60),
    poll_delay: Duration::from_secs(1),
  }
}

fn manager() -> (JobManager, Arc<MemoryStore>) {
  let store = Arc::new(MemoryStore::new());
  let manager = JobManager::new(store.clone(), settings(), "server-a");
  (manager, store)
}

#[tokio::test(start_paused = true)]
async fn submit_then_poll_is_pending() {
  let (manager, store) = manager();
  let accepted = manager.submit("x").await.unwrap();

  assert_eq!(accepted.server_id, "server-a");
  assert_eq!(accepted.task.href, format!("/job/{}", accepted.task.id));
  assert_ok!(parse_job_id(&accepted.task.id));
  assert_eq!(store.len().await, 1);

  match manager.poll(&accepted.task.id).await.unwrap() {
    PollOutcome::Pending(status) => {
      assert_eq!(status.id, accepted.task.id);
      assert_eq!(status.task_data.status, JobStatus::Pending);
      assert_eq!(status.task_data.duration, "0");
      assert_eq!(status.task_data.original_server, "server-a");
    }
    PollOutcome::Done => panic!("job finished too early"),
  }
}

#[tokio::test(start_paused = true)]
async fn job_completes_after_work_duration() {
  let (manager, _store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  tokio::time::sleep(Duration::from_secs(62)).await;
  assert!(matches!(manager.poll(&id).await.unwrap(), PollOutcome::Done));

  let result = manager.result(&id).await.unwrap();
  assert_eq!(result.task_data.status, JobStatus::Done);
  assert_eq!(result.task_data.result, "We are golden");
  assert_eq!(result.task_data.original_server, "redacted");
  assert!(!manager.supervisor().is_active(&parse_job_id(&id).unwrap()).await);
}

#[tokio::test(start_paused = true)]
async fn job_is_not_done_before_last_tick() {
  let (manager, _store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  // poll delay of 1s puts the read at 58s, before the 12th tick
  tokio::time::sleep(Duration::from_secs(57)).await;
  assert!(matches!(manager.poll(&id).await.unwrap(), PollOutcome::Pending(_)));
}

#[tokio::test(start_paused = true)]
async fn empty_payload_creates_nothing() {
  let (manager, store) = manager();
  let err = manager.submit("").await.unwrap_err();

  assert!(matches!(err, JobError::InvalidPayload));
  assert!(store.is_empty().await);
  assert_eq!(store.calls(), 0);
  assert!(manager.supervisor().active_jobs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_flight_removes_job() {
  let (manager, store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  tokio::time::sleep(Duration::from_secs(6)).await;
  assert_ok!(manager.cancel(&id).await);

  assert!(matches!(manager.poll(&id).await.unwrap_err(), JobError::NotFound(_)));
  tokio::time::sleep(Duration::from_secs(120)).await;
  assert!(store.is_empty().await);
  assert!(manager.supervisor().active_jobs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_ids_never_reach_the_store() {
  let (manager, store) = manager();

  assert!(matches!(manager.poll("not-a-uuid").await.unwrap_err(), JobError::InvalidId(_)));
  assert!(matches!(manager.result("not-a-uuid").await.unwrap_err(), JobError::InvalidId(_)));
  assert!(matches!(manager.cancel("../tasks").await.unwrap_err(), JobError::InvalidId(_)));
  assert!(matches!(manager.delete_completed("").await.unwrap_err(), JobError::InvalidId(_)));
  assert_eq!(store.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn deleting_unknown_job_is_client_error() {
  let (manager, store) = manager();
  let id = uuid::Uuid::new_v4().to_string();

  let err = manager.cancel(&id).await.unwrap_err();
  assert!(matches!(err, JobError::NotFound(_)));
  assert!(err.is_client_error());

  let err = manager.delete_completed(&id).await.unwrap_err();
  assert!(matches!(err, JobError::NotFound(_)));
  assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn done_is_never_followed_by_pending() {
  let (manager, _store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  let mut seen_done = false;
  for _ in 0..30 {
    tokio::time::sleep(Duration::from_secs(3)).await;
    let status = manager.result(&id).await.unwrap();
    if seen_done {
      assert_eq!(status.task_data.status, JobStatus::Done);
    }
    seen_done |= status.task_data.status == JobStatus::Done;
  }
  assert!(seen_done);
}

#[tokio::test(start_paused = true)]
async fn concurrent_pollers_see_non_decreasing_durations() {
  let (manager, _store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  let pollers: Vec<_> = (1..=4u64)
    .map(|n| {
      let manager = manager.clone();
      let id = id.clone();
      tokio::spawn(async move {
        let mut last = Duration::ZERO;
        let mut observed = 0;
        while let Ok(PollOutcome::Pending(status)) = manager.poll(&id).await {
          let duration = parse_elapsed(&status.task_data.duration).unwrap();
          assert!(duration >= last, "poller {} went from {:?} to {:?}", n, last, duration);
          last = duration;
          observed += 1;
          tokio::time::sleep(Duration::from_millis(700 * n)).await;
        }
        observed
      })
    })
    .collect();

  for poller in pollers {
    assert!(poller.await.unwrap() > 0);
  }
}

#[tokio::test(start_paused = true)]
async fn completed_job_can_be_deleted() {
  let (manager, store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  tokio::time::sleep(Duration::from_secs(65)).await;
  assert_ok!(manager.delete_completed(&id).await);
  assert!(matches!(manager.result(&id).await.unwrap_err(), JobError::NotFound(_)));
  assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn pending_job_deleted_before_last_tick_stays_deleted() {
  let (manager, store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  tokio::time::sleep(Duration::from_secs(57)).await;
  assert_ok!(manager.delete_completed(&id).await);
  assert!(store.is_empty().await);

  tokio::time::sleep(Duration::from_secs(10)).await;
  assert!(store.is_empty().await);
  assert!(matches!(manager.result(&id).await.unwrap_err(), JobError::NotFound(_)));
  assert!(manager.supervisor().active_jobs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn simple_variant_reaps_done_jobs() {
  let (manager, store) = manager();
  let id = manager.submit("x").await.unwrap().task.id;

  let pending = manager.status_and_reap(&id).await.unwrap();
  assert_eq!(pending.task_data.status, JobStatus::Pending);

  tokio::time::sleep(Duration::from_secs(65)).await;
  let done = manager.status_and_reap(&id).await.unwrap();
  assert_eq!(done.task_data.status, JobStatus::Done);
  assert!(store.is_empty().await);
  assert!(matches!(manager.status_and_reap(&id).await.unwrap_err(), JobError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn store_outage_is_a_server_error() {
  let (manager, store) = manager();
  store.set_available(false);

  let err = manager.submit("x").await.unwrap_err();
  assert!(matches!(err, JobError::Store(_)));
  assert!(!err.is_client_error());
  assert!(manager.supervisor().active_jobs().await.is_empty());
}
