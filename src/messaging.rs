use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use lapin::options::{
  BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::task::JoinHandle;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::supervisor::WorkerSupervisor;

static MAX_RETRIES: usize = 5;
static DELAY: u64 = 100;

pub const CANCEL_EXCHANGE: &str = "job_cancellations";

pub async fn create_rabbit_channel(rabbitmq_url: &str) -> Result<Channel> {
  let conn = Retry::spawn(ExponentialBackoff::from_millis(DELAY).take(MAX_RETRIES), || {
    Connection::connect(rabbitmq_url, ConnectionProperties::default())
  })
    .await?;
  let channel = conn.create_channel().await?;
  info!("RabbitMQ channel created");
  Ok(channel)
}

pub async fn publish_message(channel: &Channel, exchange: &str, payload: &[u8]) -> Result<()> {
  Retry::spawn(ExponentialBackoff::from_millis(DELAY).take(MAX_RETRIES), move || async move {
    channel.basic_publish(exchange, "", BasicPublishOptions::default(), payload, BasicProperties::default()).await
  })
    .await?;
  Ok(())
}

/// Fans cancellations out to every server instance, so a delete that lands
/// on one instance stops a worker running on another.
#[derive(Clone)]
pub struct CancellationRelay {
  channel: Channel,
}

impl CancellationRelay {
  pub async fn connect(rabbitmq_url: &str) -> Result<Self> {
    let channel = create_rabbit_channel(rabbitmq_url).await?;
    channel
      .exchange_declare(
        CANCEL_EXCHANGE,
        ExchangeKind::Fanout,
        ExchangeDeclareOptions::default(),
        FieldTable::default(),
      )
      .await?;
    Ok(Self { channel })
  }

  pub async fn publish(&self, id: &Uuid) -> Result<()> {
    publish_message(&self.channel, CANCEL_EXCHANGE, id.to_string().as_bytes()).await
  }

  /// Binds an exclusive queue for this instance and cancels matching local
  /// workers for every id that arrives.
  pub async fn listen(&self, supervisor: Arc<WorkerSupervisor>) -> Result<JoinHandle<()>> {
    let queue = self
      .channel
      .queue_declare(
        "",
        QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() },
        FieldTable::default(),
      )
      .await?;
    self
      .channel
      .queue_bind(queue.name().as_str(), CANCEL_EXCHANGE, "", QueueBindOptions::default(), FieldTable::default())
      .await?;
    let mut consumer = self
      .channel
      .basic_consume(
        queue.name().as_str(),
        "ljs-cancellations",
        BasicConsumeOptions { no_ack: true, ..Default::default() },
        FieldTable::default(),
      )
      .await?;

    Ok(tokio::spawn(async move {
      while let Some(delivery) = consumer.next().await {
        match delivery {
          Ok(delivery) => match parse_cancellation(&delivery.data) {
            Some(id) => {
              if supervisor.cancel(&id).await {
                info!("Relayed cancellation stopped worker {}", id);
              }
            }
            None => warn!("Ignoring malformed cancellation message"),
          },
          Err(e) => error!("Cancellation consumer error: {:?}", e),
        }
      }
      warn!("Cancellation consumer closed");
    }))
  }
}

pub fn parse_cancellation(payload: &[u8]) -> Option<Uuid> {
  let text = std::str::from_utf8(payload).ok()?;
  Uuid::parse_str(text.trim()).ok()
}
