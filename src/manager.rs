use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::JobSettings;
use crate::error::{JobError, StoreError};
use crate::messaging::CancellationRelay;
use crate::models::{AcceptedResponse, JobRecord, StatusResponse, TaskRef, parse_job_id, task_key};
use crate::store::JobStore;
use crate::supervisor::WorkerSupervisor;

#[derive(Debug)]
pub enum PollOutcome {
  Pending(StatusResponse),
  /// The job finished; the caller should fetch the result endpoint.
  Done,
}

/// Request-facing side of the job lifecycle. Holds no job state of its own:
/// every call reads or writes the store.
#[derive(Clone)]
pub struct JobManager {
  store: Arc<dyn JobStore>,
  supervisor: Arc<WorkerSupervisor>,
  settings: JobSettings,
  server_id: Arc<str>,
  relay: Option<CancellationRelay>,
}

impl JobManager {
  pub fn new(store: Arc<dyn JobStore>, settings: JobSettings, server_id: &str) -> Self {
    Self {
      store,
      supervisor: Arc::new(WorkerSupervisor::new()),
      settings,
      server_id: Arc::from(server_id),
      relay: None,
    }
  }

  pub fn with_relay(mut self, relay: CancellationRelay) -> Self {
    self.relay = Some(relay);
    self
  }

  pub fn server_id(&self) -> &str {
    &self.server_id
  }

  pub fn supervisor(&self) -> &Arc<WorkerSupervisor> {
    &self.supervisor
  }

  pub async fn submit(&self, data: &str) -> Result<AcceptedResponse, JobError> {
    if data.is_empty() {
      warn!("Rejected submission with empty payload");
      return Err(JobError::InvalidPayload);
    }

    let id = Uuid::new_v4();
    let record = JobRecord::pending(&self.server_id);
    self.store.create(&task_key(&id), &record).await.map_err(|e| {
      error!("Failed to create job {}: {:?}", id, e);
      JobError::Store(e)
    })?;

    self.supervisor.spawn(id, self.store.clone(), self.settings).await;
    info!("Job {} submitted ({} bytes of data)", id, data.len());

    Ok(AcceptedResponse {
      server_id: self.server_id.to_string(),
      task: TaskRef { href: format!("/job/{}", id), id: id.to_string() },
    })
  }

  pub async fn poll(&self, raw_id: &str) -> Result<PollOutcome, JobError> {
    let id = parse_job_id(raw_id)?;
    tokio::time::sleep(self.settings.poll_delay).await;

    let record = self.load(&id).await?;
    if record.is_done() {
      return Ok(PollOutcome::Done);
    }
    Ok(PollOutcome::Pending(self.status(&id, record)))
  }

  pub async fn result(&self, raw_id: &str) -> Result<StatusResponse, JobError> {
    let id = parse_job_id(raw_id)?;
    let record = self.load(&id).await?;
    Ok(self.status(&id, record))
  }

  /// Stops the job's worker (locally, and on other instances when a relay is
  /// configured), then removes the record.
  pub async fn cancel(&self, raw_id: &str) -> Result<(), JobError> {
    let id = parse_job_id(raw_id)?;
    if self.supervisor.cancel(&id).await {
      info!("Job {} cancelled", id);
    }
    if let Some(relay) = &self.relay {
      if let Err(e) = relay.publish(&id).await {
        error!("Failed to relay cancellation for job {}: {:?}", id, e);
      }
    }
    self.remove(&id).await
  }

  pub async fn delete_completed(&self, raw_id: &str) -> Result<(), JobError> {
    let id = parse_job_id(raw_id)?;
    self.remove(&id).await
  }

  /// Status lookup for the single-endpoint variant: a `Done` record is handed
  /// out once and deleted, so the next lookup reports it as not found.
  pub async fn status_and_reap(&self, raw_id: &str) -> Result<StatusResponse, JobError> {
    let id = parse_job_id(raw_id)?;
    tokio::time::sleep(self.settings.poll_delay).await;

    let record = self.load(&id).await?;
    if record.is_done() {
      match self.store.delete(&task_key(&id)).await {
        Ok(()) | Err(StoreError::NotFound(_)) => info!("Job {} reaped after completion", id),
        Err(e) => error!("Failed to reap job {}: {:?}", id, e),
      }
    }
    Ok(self.status(&id, record))
  }

  async fn load(&self, id: &Uuid) -> Result<JobRecord, JobError> {
    self.store.get(&task_key(id)).await.map_err(|e| {
      warn!("Lookup of job {} failed: {:?}", id, e);
      JobError::from_store(&id.to_string(), e)
    })
  }

  async fn remove(&self, id: &Uuid) -> Result<(), JobError> {
    self.store.delete(&task_key(id)).await.map_err(|e| {
      warn!("Delete of job {} failed: {:?}", id, e);
      JobError::from_store(&id.to_string(), e)
    })?;
    info!("Job {} deleted", id);
    Ok(())
  }

  fn status(&self, id: &Uuid, record: JobRecord) -> StatusResponse {
    StatusResponse {
      task_data: record,
      id: id.to_string(),
      server_id: self.server_id.to_string(),
    }
  }
}
