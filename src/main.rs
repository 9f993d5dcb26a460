use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use uuid::Uuid;

use ljs::config::Config;
use ljs::database::{PgStore, setup_database};
use ljs::manager::JobManager;
use ljs::messaging::CancellationRelay;
use ljs::routes::routes;
use ljs::store::{JobStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt::init();
  let config = Config::from_env().context("invalid configuration")?;
  let server_id = Uuid::new_v4().to_string();
  info!("Starting long job server {}", server_id);

  let store: Arc<dyn JobStore> = match &config.database_url {
    Some(url) => Arc::new(PgStore::new(setup_database(url).await?, config.project_id.clone())),
    None => {
      warn!("DATABASE_URL not set, jobs are kept in memory");
      Arc::new(MemoryStore::new())
    }
  };

  let mut manager = JobManager::new(store, config.job_settings(), &server_id);
  if let Some(url) = &config.rabbitmq_url {
    let relay = CancellationRelay::connect(url).await.context("failed to connect cancellation relay")?;
    let _listener = relay.listen(manager.supervisor().clone()).await?;
    manager = manager.with_relay(relay);
  }

  let supervisor = manager.supervisor().clone();
  let (addr, server) = warp::serve(routes(manager))
    .try_bind_with_graceful_shutdown(([0, 0, 0, 0], config.server_port), async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {:?}", e);
      }
    })?;
  info!("Listening on {}", addr);
  server.await;

  supervisor.shutdown().await;
  Ok(())
}
