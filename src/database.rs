use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::info;

use crate::error::StoreError;
use crate::models::JobRecord;
use crate::store::JobStore;

static MIGRATOR: Migrator = sqlx::migrate!();
static MAX_RETRIES: usize = 5;
static DELAY: u64 = 100;

pub async fn setup_database(database_url: &str) -> anyhow::Result<Pool<Postgres>> {
  let pool = Retry::spawn(ExponentialBackoff::from_millis(DELAY).take(MAX_RETRIES), || {
    Pool::<Postgres>::connect(database_url)
  })
    .await?;

  MIGRATOR.run(&pool).await?;
  info!("Database migrations complete");
  Ok(pool)
}

/// Postgres-backed document store. `namespace` separates deployments that
/// share one database.
#[derive(Clone)]
pub struct PgStore {
  pool: Pool<Postgres>,
  namespace: String,
}

impl PgStore {
  pub fn new(pool: Pool<Postgres>, namespace: impl Into<String>) -> Self {
    Self { pool, namespace: namespace.into() }
  }
}

#[async_trait]
impl JobStore for PgStore {
  async fn create(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
    let inserted = sqlx::query(
      "INSERT INTO job_documents (namespace, key, doc) VALUES ($1, $2, $3)
       ON CONFLICT (namespace, key) DO NOTHING",
    )
      .bind(&self.namespace)
      .bind(key)
      .bind(Json(record))
      .execute(&self.pool)
      .await?
      .rows_affected();
    if inserted == 0 {
      return Err(StoreError::AlreadyExists(key.to_string()));
    }
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<JobRecord, StoreError> {
    let row: Option<(Json<JobRecord>,)> =
      sqlx::query_as("SELECT doc FROM job_documents WHERE namespace = $1 AND key = $2")
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
    row
      .map(|(Json(record),)| record)
      .ok_or_else(|| StoreError::NotFound(key.to_string()))
  }

  async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO job_documents (namespace, key, doc) VALUES ($1, $2, $3)
       ON CONFLICT (namespace, key) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()",
    )
      .bind(&self.namespace)
      .bind(key)
      .bind(Json(record))
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), StoreError> {
    let removed = sqlx::query("DELETE FROM job_documents WHERE namespace = $1 AND key = $2")
      .bind(&self.namespace)
      .bind(key)
      .execute(&self.pool)
      .await?
      .rows_affected();
    if removed == 0 {
      return Err(StoreError::NotFound(key.to_string()));
    }
    Ok(())
  }
}
