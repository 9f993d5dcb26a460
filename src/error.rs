use thiserror::Error;
use warp::http::StatusCode;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("document not found: {0}")]
  NotFound(String),

  #[error("document already exists: {0}")]
  AlreadyExists(String),

  #[error("job store unavailable")]
  Unavailable,

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Errors surfaced by the job manager. The first three are the caller's
/// fault and map to 400; store failures map to 500 and are never retried.
#[derive(Debug, Error)]
pub enum JobError {
  #[error("Missing data in payload")]
  InvalidPayload,

  #[error("Invalid job id: {0}")]
  InvalidId(String),

  #[error("Task not found: {0}")]
  NotFound(String),

  #[error("Store error: {0}")]
  Store(StoreError),
}

impl JobError {
  pub fn is_client_error(&self) -> bool {
    !matches!(self, JobError::Store(_))
  }

  pub fn status_code(&self) -> StatusCode {
    if self.is_client_error() {
      StatusCode::BAD_REQUEST
    } else {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }

  pub(crate) fn from_store(id: &str, err: StoreError) -> Self {
    match err {
      StoreError::NotFound(_) => JobError::NotFound(id.to_string()),
      other => JobError::Store(other),
    }
  }
}

#[derive(Debug, Error)]
pub enum PollerError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("unexpected status {status}: {body}")]
  UnexpectedStatus { status: u16, body: String },

  #[error("invalid target url: {0}")]
  InvalidUrl(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_errors_map_to_bad_request() {
    assert_eq!(JobError::InvalidPayload.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(JobError::InvalidId("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(JobError::NotFound("x".into()).status_code(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn store_errors_map_to_server_error() {
    let err = JobError::Store(StoreError::Unavailable);
    assert!(!err.is_client_error());
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn missing_document_becomes_not_found() {
    let err = JobError::from_store("abc", StoreError::NotFound("tasks/abc".into()));
    assert_eq!(err.to_string(), "Task not found: abc");
  }
}
