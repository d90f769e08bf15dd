//! Helpers for opening queues and publishing to them

use super::rabbitmq::RabbitMqBroker;
use super::traits::{BrokerCredentials, MessageBroker};
use crate::config::BrokerConfig;
use crate::domain::errors::{BrokerError, DispatcherError};
use crate::domain::ids::ChannelId;
use crate::domain::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Connects to the configured broker, opens a channel and checks `queue` exists
///
/// # Errors
///
/// Returns `BrokerError::Connection` or `BrokerError::Channel` if the broker
/// cannot be reached, and `BrokerError::QueueNotFound` if the queue is missing.
pub async fn connect_to_server_and_queue(
    config: &BrokerConfig,
    queue: &str,
) -> Result<(Arc<dyn MessageBroker>, ChannelId)> {
    let credentials = BrokerCredentials::from_config(config);
    let broker = RabbitMqBroker::connect(&credentials, &config.host, config.port).await?;
    let broker: Arc<dyn MessageBroker> = Arc::new(broker);
    let channel = broker.create_channel().await?;
    connect_to_queue(broker.as_ref(), channel, queue).await?;
    Ok((broker, channel))
}

/// Checks that `queue` exists using an already-open channel
///
/// # Errors
///
/// Returns `BrokerError::QueueNotFound` if the queue is missing.
pub async fn connect_to_queue(
    broker: &dyn MessageBroker,
    channel: ChannelId,
    queue: &str,
) -> Result<()> {
    if !broker.queue_exists(channel, queue).await? {
        return Err(BrokerError::QueueNotFound(queue.to_string()).into());
    }
    Ok(())
}

/// Publishes `payload` unless `cancel` has already fired
///
/// # Errors
///
/// Returns `DispatcherError::Cancelled` without publishing when the token is
/// cancelled, or the broker's publish error.
pub async fn send_to_queue(
    cancel: &CancellationToken,
    broker: &dyn MessageBroker,
    channel: ChannelId,
    queue: &str,
    payload: &[u8],
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(DispatcherError::Cancelled.into());
    }
    broker.publish(channel, queue, payload).await
}

/// A broker, channel and queue name bundled as a publish destination
#[derive(Clone)]
pub struct QueueTarget {
    broker: Arc<dyn MessageBroker>,
    channel: ChannelId,
    queue: String,
}

impl QueueTarget {
    pub fn new(broker: Arc<dyn MessageBroker>, channel: ChannelId, queue: impl Into<String>) -> Self {
        Self {
            broker,
            channel,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Publishes `payload` to the target queue unless `cancel` has fired
    pub async fn send(&self, cancel: &CancellationToken, payload: &[u8]) -> Result<()> {
        send_to_queue(cancel, self.broker.as_ref(), self.channel, &self.queue, payload).await
    }
}

impl std::fmt::Debug for QueueTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTarget")
            .field("channel", &self.channel)
            .field("queue", &self.queue)
            .finish()
    }
}
