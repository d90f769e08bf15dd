//! Consumer loop
//!
//! Binds one queue to one [`MessageHandler`]. Deliveries are processed by
//! [`process_messages`] on a separate task while this loop drains the handler
//! error stream into the log.

use crate::adapters::broker::{process_messages, MessageBroker, MessageHandler};
use crate::config::AckPolicy;
use crate::core::metrics::PipelineMetrics;
use crate::domain::{ChannelId, LanternError, Result};
use crate::log_handler_error;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const ERROR_BUFFER: usize = 64;

/// A queue, the handler for its messages and how failures are settled
pub struct ConsumerLoop {
    broker: Arc<dyn MessageBroker>,
    channel: ChannelId,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    policy: AckPolicy,
    metrics: Arc<PipelineMetrics>,
}

impl ConsumerLoop {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        channel: ChannelId,
        queue: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
        policy: AckPolicy,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            broker,
            channel,
            queue: queue.into(),
            handler,
            policy,
            metrics,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Consumes until the stream ends or `cancel` fires
    ///
    /// On cancellation the delivery being handled, if any, runs to completion
    /// and is settled before this returns. Deliveries not yet taken from the
    /// stream stay on the queue.
    ///
    /// # Errors
    ///
    /// Returns the broker error if consuming cannot start, or the transport
    /// error that ended the stream.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let stream = self.broker.consume(self.channel, &self.queue).await?;
        let (errors_tx, mut errors_rx) = mpsc::channel::<LanternError>(ERROR_BUFFER);

        let mut processing = tokio::spawn(process_messages(
            stream,
            Arc::clone(&self.handler),
            self.policy,
            errors_tx,
            Arc::clone(&self.metrics),
            cancel.clone(),
        ));
        tracing::info!(queue = %self.queue, policy = ?self.policy, "Consuming");

        let joined = loop {
            tokio::select! {
                Some(err) = errors_rx.recv() => {
                    log_handler_error!(self.queue, err);
                }
                joined = &mut processing => break joined,
            }
        };
        while let Ok(err) = errors_rx.try_recv() {
            log_handler_error!(self.queue, err);
        }

        if cancel.is_cancelled() {
            tracing::info!(queue = %self.queue, "Consumer stopped");
        } else {
            tracing::info!(queue = %self.queue, "Message stream ended");
        }
        joined.map_err(|e| LanternError::Other(format!("consumer task failed: {e}")))?
    }
}
