//! Message broker abstraction traits
//!
//! This module defines the transport-neutral interface the pipeline uses to
//! publish and consume queue messages. Handlers never see the acknowledgement
//! token; they receive only the payload bytes.

use crate::config::{BrokerConfig, SecretString};
use crate::domain::ids::ChannelId;
use crate::domain::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Credentials used to open a broker connection
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: SecretString,
}

impl BrokerCredentials {
    /// Takes the credentials from the `[broker]` section
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// Acknowledgement token of one delivery
///
/// Consumed by value so a delivery is settled at most once.
#[async_trait]
pub trait Acknowledger: Send {
    /// Confirm the delivery so the broker forgets it
    async fn ack(self: Box<Self>) -> Result<()>;

    /// Reject the delivery, asking the broker to redeliver it when `requeue` is set
    async fn nack(self: Box<Self>, requeue: bool) -> Result<()>;
}

/// One message received from a queue
pub struct Delivery {
    payload: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Pairs a payload with its acknowledgement token
    pub fn new(payload: Vec<u8>, acker: Box<dyn Acknowledger>) -> Self {
        Self { payload, acker }
    }

    /// Raw message body
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> Result<()> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Lazy sequence of deliveries from one queue subscription
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Durable publish/subscribe transport
///
/// A [`ChannelId`] is valid only for the broker that created it.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Opens a new channel on the live connection
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Channel` if the connection is closed or the
    /// broker refuses the channel.
    async fn create_channel(&self) -> Result<ChannelId>;

    /// Limits the number of unacknowledged deliveries pushed to this channel
    async fn set_prefetch(&self, channel: ChannelId, count: u16) -> Result<()>;

    /// Passive existence check that never creates the queue
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Broker` for any failure other than "not found".
    async fn queue_exists(&self, channel: ChannelId, name: &str) -> Result<bool>;

    /// Creates a durable queue if it does not already exist
    async fn declare_queue(&self, channel: ChannelId, name: &str) -> Result<()>;

    /// Publishes a persistent message to the named queue
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Publish` if the broker does not accept the message.
    async fn publish(&self, channel: ChannelId, queue: &str, payload: &[u8]) -> Result<()>;

    /// Subscribes to the named queue with manual acknowledgement
    ///
    /// Every call starts a fresh subscription.
    async fn consume(&self, channel: ChannelId, queue: &str) -> Result<MessageStream>;

    /// Releases all channels, then the connection
    async fn close(&self) -> Result<()>;
}

/// Handler invoked once per delivered payload
///
/// Handlers carry their own configuration, so the only per-call input is the
/// payload. They must tolerate duplicate delivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<()>;
}
