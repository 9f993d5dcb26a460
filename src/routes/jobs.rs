use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::manager::{JobManager, PollOutcome};
use crate::models::NewJob;
use crate::routes::{error_reply, with_manager};

const MAX_PAYLOAD_BYTES: u64 = 64 * 1024;

pub fn job_routes(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  submit_route(manager.clone())
    .or(output_route(manager.clone()))
    .or(delete_output_route(manager.clone()))
    .or(status_route(manager.clone()))
    .or(cancel_route(manager))
}

pub fn submit_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("job")
    .and(warp::post())
    .and(warp::body::content_length_limit(MAX_PAYLOAD_BYTES))
    .and(warp::body::json())
    .and(with_manager(manager))
    .and_then(handle_submit)
}

pub fn status_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("job" / String)
    .and(warp::get())
    .and(with_manager(manager))
    .and_then(handle_status)
}

pub fn output_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("job" / String / "output")
    .and(warp::get())
    .and(with_manager(manager))
    .and_then(handle_output)
}

pub fn cancel_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("job" / String)
    .and(warp::delete())
    .and(with_manager(manager))
    .and_then(handle_cancel)
}

pub fn delete_output_route(manager: JobManager) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
  warp::path!("job" / String / "output")
    .and(warp::delete())
    .and(with_manager(manager))
    .and_then(handle_delete_output)
}

async fn handle_submit(new_job: NewJob, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.submit(&new_job.data).await {
    Ok(accepted) => warp::reply::with_status(warp::reply::json(&accepted), StatusCode::ACCEPTED).into_response(),
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}

async fn handle_status(id: String, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.poll(&id).await {
    Ok(PollOutcome::Pending(status)) => warp::reply::json(&status).into_response(),
    Ok(PollOutcome::Done) => {
      let location = format!("/job/{}/output", id);
      warp::reply::with_header(StatusCode::SEE_OTHER, "location", location).into_response()
    }
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}

async fn handle_output(id: String, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.result(&id).await {
    Ok(status) => warp::reply::json(&status).into_response(),
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}

async fn handle_cancel(id: String, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.cancel(&id).await {
    Ok(()) => "OK".into_response(),
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}

async fn handle_delete_output(id: String, manager: JobManager) -> Result<warp::reply::Response, Rejection> {
  let reply = match manager.delete_completed(&id).await {
    Ok(()) => "OK".into_response(),
    Err(e) => error_reply(&e),
  };
  Ok(reply)
}
