use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::JobRecord;

/// Keyed document store holding one record per job. Every manager and
/// worker operation round-trips through it; nothing is cached locally.
#[async_trait]
pub trait JobStore: Send + Sync {
  /// Fails with `AlreadyExists` if the key is taken.
  async fn create(&self, key: &str, record: &JobRecord) -> Result<(), StoreError>;
  async fn get(&self, key: &str) -> Result<JobRecord, StoreError>;
  async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError>;
  /// Fails with `NotFound` if the key is absent.
  async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  docs: Mutex<HashMap<String, JobRecord>>,
  calls: AtomicUsize,
  unavailable: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Total number of store operations attempted so far.
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn set_available(&self, available: bool) {
    self.unavailable.store(!available, Ordering::SeqCst);
  }

  pub async fn len(&self) -> usize {
    self.docs.lock().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.docs.lock().await.is_empty()
  }

  fn enter(&self) -> Result<(), StoreError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable);
    }
    Ok(())
  }
}

#[async_trait]
impl JobStore for MemoryStore {
  async fn create(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
    self.enter()?;
    let mut docs = self.docs.lock().await;
    if docs.contains_key(key) {
      return Err(StoreError::AlreadyExists(key.to_string()));
    }
    docs.insert(key.to_string(), record.clone());
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<JobRecord, StoreError> {
    self.enter()?;
    self.docs
      .lock()
      .await
      .get(key)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(key.to_string()))
  }

  async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
    self.enter()?;
    self.docs.lock().await.insert(key.to_string(), record.clone());
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), StoreError> {
    self.enter()?;
    self.docs
      .lock()
      .await
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| StoreError::NotFound(key.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_test::{assert_err, assert_ok};

  #[tokio::test]
  async fn create_rejects_existing_key() {
    let store = MemoryStore::new();
    let record = JobRecord::pending("srv");
    assert_ok!(store.create("tasks/a", &record).await);
    let err = store.create("tasks/a", &record).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
  }

  #[tokio::test]
  async fn delete_of_missing_key_is_not_found() {
    let store = MemoryStore::new();
    let err = store.delete("tasks/missing").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.is_empty().await);
  }

  #[tokio::test]
  async fn unavailable_store_fails_every_call() {
    let store = MemoryStore::new();
    store.set_available(false);
    assert_err!(store.get("tasks/a").await);
    assert_err!(store.set("tasks/a", &JobRecord::pending("srv")).await);
    assert_eq!(store.calls(), 2);
    assert!(store.is_empty().await);
  }
}
