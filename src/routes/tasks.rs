//! Single-endpoint variant used by the standalone client: no payload on
//! submit, and completed jobs are deleted the first time they are observed.

use serde::Deserialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::manager::JobManager;
use crate::routes::{error_reply, with_manager};

pub const LONGTASK_DATA: &str = "longtask";

#[derive(Deserialize)]
pub struct TaskQuery {
  pub task: String,
}

pub fn task_routes(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  longtask_route(manager.clone()).or(taskstatus_route(manager))
}

pub fn longtask_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("longtask")
    .and(warp::get())
    .and(with_manager(manager))
    .and_then(handle_longtask)
}

pub fn taskstatus_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("taskstatus")
    .and(warp::get())
    .and(warp::query::<TaskQuery>())
    .and(with_manager(manager))
    .and_then(handle_taskstatus)
}

async fn handle_longtask(manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.submit(LONGTASK_DATA).await {
    Ok(mut accepted) => {
      accepted.task.href = format!("/taskstatus?task={}", accepted.task.id);
      warp::reply::with_status(warp::reply::json(&accepted), StatusCode::ACCEPTED).into_response()
    }
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}

async fn handle_taskstatus(query: TaskQuery, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.status_and_reap(&query.task).await {
    Ok(status) => warp::reply::json(&status).into_response(),
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}
