use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ljs::config::{ApiFlavor, JobSettings};
use ljs::manager::JobManager;
use ljs::poller::ClientPoller;
use ljs::routes::routes;
use ljs::store::MemoryStore;

fn start_server() -> (SocketAddr, Arc<MemoryStore>) {
  let settings = JobSettings {
    tick_interval: Duration::from_millis(20),
    work_duration: Duration::from_millis(100),
    poll_delay: Duration::ZERO,
  };
  let store = Arc::new(MemoryStore::new());
  let manager = JobManager::new(store.clone(), settings, "server-a");
  let (addr, server) = warp::serve(routes(manager)).bind_ephemeral(([127, 0, 0, 1], 0));
  tokio::spawn(server);
  (addr, store)
}

fn poller(addr: SocketAddr, flavor: ApiFlavor) -> ClientPoller {
  ClientPoller::new(&format!("http://{}", addr), flavor)
    .unwrap()
    .with_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn rest_pollers_follow_job_to_completion() {
  let (addr, store) = start_server();
  let reports = poller(addr, ApiFlavor::Rest).run("x", 3).await.unwrap();

  assert_eq!(reports.len(), 3);
  for report in &reports {
    assert!(report.error.is_none(), "{:?}", report);
    assert!(report.saw_done);
    assert_eq!(report.regressions, 0);
    assert!(report.last_duration.unwrap() >= Duration::from_millis(100));
  }
  // the client deletes the finished job once every loop is done
  assert!(store.is_empty().await);
}

#[tokio::test]
async fn simple_pollers_stop_once_job_is_reaped() {
  let (addr, store) = start_server();
  let reports = poller(addr, ApiFlavor::Simple).run("ignored", 4).await.unwrap();

  assert_eq!(reports.len(), 4);
  assert!(reports.iter().all(|r| r.error.is_none() && r.regressions == 0));
  assert!(reports.iter().any(|r| r.saw_done));
  assert!(store.is_empty().await);
}

#[tokio::test]
async fn unknown_job_ends_every_loop_immediately() {
  let (addr, store) = start_server();
  let id = uuid::Uuid::new_v4().to_string();
  let reports = poller(addr, ApiFlavor::Rest).fan_out(&id, 2).await;

  for report in &reports {
    assert_eq!(report.polls, 1);
    assert!(!report.saw_done);
    assert!(report.error.is_none());
  }
  assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn transport_failure_ends_the_loop_with_an_error() {
  let addr = {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
  };
  let reports = poller(addr, ApiFlavor::Rest).fan_out(&uuid::Uuid::new_v4().to_string(), 2).await;

  assert_eq!(reports.len(), 2);
  assert!(reports.iter().all(|r| r.error.is_some() && r.polls == 0));
}

#[tokio::test]
async fn submit_surfaces_rejections() {
  let (addr, _store) = start_server();
  let err = poller(addr, ApiFlavor::Rest).submit("").await.unwrap_err();
  assert!(err.to_string().contains("400"), "{}", err);
}
