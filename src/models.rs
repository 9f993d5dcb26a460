use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

pub const PENDING_RESULT: &str = "Nothing yet wait for it....";
pub const DONE_RESULT: &str = "We are golden";
pub const REDACTED_SERVER: &str = "redacted";
pub const INITIAL_DURATION: &str = "0";

static JOB_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-4[a-fA-F0-9]{3}-[89aAbB][a-fA-F0-9]{3}-[a-fA-F0-9]{12}$",
  )
  .expect("job id pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
  #[serde(rename = "PENDING")]
  Pending,
  #[serde(rename = "Done")]
  Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
  #[serde(rename = "result")]
  pub result: String,
  #[serde(rename = "jobstatus")]
  pub status: JobStatus,
  #[serde(rename = "duration")]
  pub duration: String,
  #[serde(rename = "originalserver")]
  pub original_server: String,
}

impl JobRecord {
  pub fn pending(server_id: &str) -> Self {
    Self {
      result: PENDING_RESULT.into(),
      status: JobStatus::Pending,
      duration: INITIAL_DURATION.into(),
      original_server: server_id.into(),
    }
  }

  pub fn done(elapsed: Duration) -> Self {
    Self {
      result: DONE_RESULT.into(),
      status: JobStatus::Done,
      duration: format_elapsed(elapsed),
      original_server: REDACTED_SERVER.into(),
    }
  }

  pub fn is_done(&self) -> bool {
    self.status == JobStatus::Done
  }
}

#[derive(Debug, Deserialize)]
pub struct NewJob {
  #[serde(rename = "Data", alias = "data", default)]
  pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
  pub href: String,
  pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
  #[serde(rename = "ServerId")]
  pub server_id: String,
  pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
  #[serde(rename = "taskdata")]
  pub task_data: JobRecord,
  pub id: String,
  #[serde(rename = "serverid")]
  pub server_id: String,
}

pub fn task_key(id: &Uuid) -> String {
  format!("tasks/{}", id)
}

/// Accepts only canonical v4 ids; everything else is rejected before the
/// store is touched.
pub fn parse_job_id(raw: &str) -> Result<Uuid, JobError> {
  if !JOB_ID_PATTERN.is_match(raw) {
    return Err(JobError::InvalidId(raw.to_string()));
  }
  Uuid::parse_str(raw).map_err(|_| JobError::InvalidId(raw.to_string()))
}

pub fn format_elapsed(elapsed: Duration) -> String {
  format!("{}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
}

pub fn parse_elapsed(raw: &str) -> Option<Duration> {
  if raw == INITIAL_DURATION {
    return Some(Duration::ZERO);
  }
  let secs: f64 = raw.strip_suffix('s')?.parse().ok()?;
  Duration::try_from_secs_f64(secs).ok()
}
