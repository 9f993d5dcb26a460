use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::cancellation::CancellationRegistry;
use crate::config::JobSettings;
use crate::store::JobStore;
use crate::worker::{Worker, WorkerExit};

/// Tracks every running worker by job id. At most one worker exists per id;
/// workers deregister themselves when they exit.
#[derive(Default)]
pub struct WorkerSupervisor {
  registry: CancellationRegistry,
  handles: Mutex<HashMap<Uuid, JoinHandle<WorkerExit>>>,
}

impl WorkerSupervisor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts a worker for `id`. Returns `false` without spawning if one is
  /// already running.
  pub async fn spawn(self: &Arc<Self>, id: Uuid, store: Arc<dyn JobStore>, settings: JobSettings) -> bool {
    let Some(token) = self.registry.register(id).await else {
      return false;
    };
    let worker = Worker::new(id, store, settings, token);
    let supervisor = Arc::clone(self);

    // held across spawn so a fast-exiting worker cannot retire before it is tracked
    let mut handles = self.handles.lock().await;
    let handle = tokio::spawn(async move {
      let exit = worker.run().await;
      supervisor.retire(&id).await;
      exit
    });
    handles.insert(id, handle);
    true
  }

  /// Signals the worker for `id` and waits for it to stop. Returns whether a
  /// worker was running.
  pub async fn cancel(&self, id: &Uuid) -> bool {
    let signalled = self.registry.signal(id).await;
    let handle = self.handles.lock().await.remove(id);
    if let Some(handle) = handle {
      match handle.await {
        Ok(exit) => info!("Worker {} stopped: {:?}", id, exit),
        Err(e) => error!("Worker {} panicked: {:?}", id, e),
      }
    }
    signalled
  }

  pub async fn is_active(&self, id: &Uuid) -> bool {
    self.handles
      .lock()
      .await
      .get(id)
      .is_some_and(|handle| !handle.is_finished())
  }

  pub async fn active_jobs(&self) -> Vec<Uuid> {
    self.handles
      .lock()
      .await
      .iter()
      .filter(|(_, handle)| !handle.is_finished())
      .map(|(id, _)| *id)
      .collect()
  }

  /// Cancels every running worker. Their records are left as they are.
  pub async fn shutdown(&self) {
    let ids: Vec<Uuid> = self.handles.lock().await.keys().copied().collect();
    info!("Stopping {} workers", ids.len());
    for id in ids {
      self.cancel(&id).await;
    }
  }

  async fn retire(&self, id: &Uuid) {
    self.registry.release(id).await;
    self.handles.lock().await.remove(id);
  }
}
