use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JobSettings;
use crate::error::StoreError;
use crate::models::{JobRecord, format_elapsed, task_key};
use crate::store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
  Completed,
  Cancelled,
  /// The store failed; the record stays in its last written state.
  StoreFailed,
  /// The record was deleted underneath the worker.
  RecordMissing,
}

/// Background unit that owns one job id and drives it to `Done`.
pub struct Worker {
  id: Uuid,
  store: Arc<dyn JobStore>,
  settings: JobSettings,
  cancel: CancellationToken,
}

impl Worker {
  pub fn new(id: Uuid, store: Arc<dyn JobStore>, settings: JobSettings, cancel: CancellationToken) -> Self {
    Self { id, store, settings, cancel }
  }

  pub async fn run(self) -> WorkerExit {
    let key = task_key(&self.id);
    let tick = self.settings.tick_interval;
    let total_ticks = self.settings.total_ticks();
    let started = Instant::now();

    let mut interval = interval_at(started + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(interval);
    let mut ticks_elapsed: u64 = 0;

    info!("Worker {}: started, {} ticks of {:?}", self.id, total_ticks, tick);
    loop {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => return self.cancelled(),
        _ = ticks.next() => {}
      }

      ticks_elapsed += 1;
      let elapsed = started.elapsed();
      debug!("Worker {}: running for {:?}", self.id, elapsed);

      // a deleted record stays deleted, including on the terminal tick
      let mut record = match self.store.get(&key).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => {
          warn!("Worker {}: record disappeared, stopping", self.id);
          return WorkerExit::RecordMissing;
        }
        Err(e) => return self.store_failed(e),
      };

      if self.cancel.is_cancelled() {
        return self.cancelled();
      }

      if ticks_elapsed >= total_ticks {
        return match self.store.set(&key, &JobRecord::done(elapsed)).await {
          Ok(()) => {
            info!("Worker {}: job done after {} ticks ({:?})", self.id, ticks_elapsed, elapsed);
            WorkerExit::Completed
          }
          Err(e) => self.store_failed(e),
        };
      }

      record.duration = format_elapsed(elapsed);
      if let Err(e) = self.store.set(&key, &record).await {
        return self.store_failed(e);
      }
    }
  }

  fn cancelled(&self) -> WorkerExit {
    info!("Worker {}: cancelled", self.id);
    WorkerExit::Cancelled
  }

  fn store_failed(&self, e: StoreError) -> WorkerExit {
    error!("Worker {}: store failure, giving up: {:?}", self.id, e);
    WorkerExit::StoreFailed
  }
}
