//! Id-addressed cancellation. Each running worker owns one token; a
//! cancellation for one job can never be observed by another job's worker.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
pub struct CancellationRegistry {
  tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancellationRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns `None` if `id` already has a live token.
  pub async fn register(&self, id: Uuid) -> Option<CancellationToken> {
    let mut tokens = self.tokens.lock().await;
    if tokens.contains_key(&id) {
      return None;
    }
    let token = CancellationToken::new();
    tokens.insert(id, token.clone());
    Some(token)
  }

  /// Cancels the token for `id`. Returns whether a worker was listening.
  pub async fn signal(&self, id: &Uuid) -> bool {
    match self.tokens.lock().await.get(id) {
      Some(token) => {
        token.cancel();
        true
      }
      None => false,
    }
  }

  pub async fn release(&self, id: &Uuid) {
    self.tokens.lock().await.remove(id);
  }
}
