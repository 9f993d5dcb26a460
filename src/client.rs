use anyhow::Context;
use tracing::info;

use ljs::config::ClientConfig;
use ljs::poller::ClientPoller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt::init();
  let config = ClientConfig::from_env().context("invalid client configuration")?;
  let poller = ClientPoller::try_from(&config)?;

  let reports = poller.run(&config.payload, config.requests).await?;
  let failed = reports.iter().filter(|r| r.error.is_some()).count();
  let regressions: u64 = reports.iter().map(|r| r.regressions).sum();
  info!(
    "We are done: {} pollers, {} failed, {} duration regressions",
    reports.len(), failed, regressions
  );
  Ok(())
}
