use std::convert::Infallible;

use serde::Serialize;
use tracing::error;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::error::JobError;
use crate::manager::JobManager;

pub mod jobs;
pub mod tasks;

pub fn routes(
  manager: JobManager,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
  jobs::job_routes(manager.clone())
    .or(tasks::task_routes(manager.clone()))
    .or(health_route(manager))
    .recover(handle_rejection)
    .with(warp::trace::request())
}

pub(crate) fn with_manager(manager: JobManager) -> impl Filter<Extract = (JobManager,), Error = Infallible> + Clone {
  warp::any().map(move || manager.clone())
}

pub(crate) fn error_reply(err: &JobError) -> warp::reply::Response {
  warp::reply::with_status(err.to_string(), err.status_code()).into_response()
}

#[derive(Serialize)]
struct Health {
  #[serde(rename = "ServerId")]
  server_id: String,
  active_workers: usize,
}

fn health_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("health")
    .and(warp::get())
    .and(with_manager(manager))
    .and_then(handle_health)
}

async fn handle_health(manager: JobManager) -> Result<impl warp::Reply, Rejection> {
  let health = Health {
    server_id: manager.server_id().to_string(),
    active_workers: manager.supervisor().active_jobs().await.len(),
  };
  Ok(warp::reply::json(&health))
}

async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
  let (code, message) = if err.is_not_found() {
    (StatusCode::NOT_FOUND, "Not found".to_string())
  } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
    (StatusCode::BAD_REQUEST, format!("Malformed payload: {}", e))
  } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
    (StatusCode::BAD_REQUEST, e.to_string())
  } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
    (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
  } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON payload".to_string())
  } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
  } else {
    error!("Unhandled rejection: {:?}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
  };
  Ok(warp::reply::with_status(message, code))
}
