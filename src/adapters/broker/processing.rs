//! Sequential dispatch of deliveries to a message handler

use super::traits::{MessageHandler, MessageStream};
use crate::config::AckPolicy;
use crate::core::metrics::PipelineMetrics;
use crate::domain::{LanternError, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runs `handler` over every delivery of `messages`, one at a time
///
/// Delivery `n + 1` is not taken from the stream until delivery `n` has been
/// settled. Handler errors never stop the loop: they are sent to `errors` and
/// the delivery is settled according to `policy`. Under
/// [`AckPolicy::AckAlways`] a failed message is acknowledged and therefore
/// not retried.
///
/// `cancel` is only checked between deliveries: a handler already running
/// completes and its delivery is settled before the loop returns.
///
/// Returns when the stream ends or `cancel` fires.
///
/// # Errors
///
/// Returns an error if the stream yields a transport error or a delivery
/// cannot be acknowledged.
pub async fn process_messages(
    mut messages: MessageStream,
    handler: Arc<dyn MessageHandler>,
    policy: AckPolicy,
    errors: mpsc::Sender<LanternError>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = messages.next() => next,
        };
        let Some(next) = next else {
            break;
        };
        let delivery = next?;
        let outcome = handler.handle(delivery.payload()).await;
        metrics.record_message_processed();

        match outcome {
            Ok(()) => {
                delivery.ack().await?;
                metrics.record_ack();
            }
            Err(err) => {
                metrics.record_handler_error();
                match policy {
                    AckPolicy::AckAlways => {
                        delivery.ack().await?;
                        metrics.record_ack();
                    }
                    AckPolicy::NackRequeueOnError => {
                        delivery.nack(true).await?;
                        metrics.record_nack(true);
                    }
                }
                if let Err(mpsc::error::SendError(err)) = errors.send(err).await {
                    tracing::warn!(error = %err, "Handler error with no listener");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::{InMemoryBroker, MessageBroker};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for FailFirst {
        async fn handle(&self, _payload: &[u8]) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(LanternError::MalformedMessage("bad".to_string()));
            }
            Ok(())
        }
    }

    async fn run(policy: AckPolicy) -> (InMemoryBroker, Vec<LanternError>, usize) {
        let broker = InMemoryBroker::new();
        let ch = broker.create_channel().await.unwrap();
        broker.declare_queue(ch, "q").await.unwrap();
        broker.publish(ch, "q", b"one").await.unwrap();
        let stream = broker.consume(ch, "q").await.unwrap();
        broker.close().await.unwrap();

        let handler = Arc::new(FailFirst {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        process_messages(
            stream,
            handler.clone(),
            policy,
            tx,
            Arc::new(PipelineMetrics::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let mut errors = Vec::new();
        while let Ok(err) = rx.try_recv() {
            errors.push(err);
        }
        (broker, errors, handler.calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_ack_always_acks_failed_message() {
        let (broker, errors, calls) = run(AckPolicy::AckAlways).await;
        let stats = broker.stats().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(calls, 1);
        assert_eq!(stats.acked, 1);
        assert_eq!(stats.redelivered, 0);
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers_failed_message() {
        let (broker, errors, calls) = run(AckPolicy::NackRequeueOnError).await;
        let stats = broker.stats().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(calls, 2);
        assert_eq!(stats.nacked, 1);
        assert_eq!(stats.redelivered, 1);
        assert_eq!(stats.acked, 1);
    }

    #[tokio::test]
    async fn test_cancel_leaves_undelivered_messages_queued() {
        let broker = InMemoryBroker::new();
        let ch = broker.create_channel().await.unwrap();
        broker.declare_queue(ch, "q").await.unwrap();
        broker.publish(ch, "q", b"waiting").await.unwrap();
        let stream = broker.consume(ch, "q").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(1);
        let handler = Arc::new(FailFirst {
            calls: AtomicUsize::new(0),
        });
        process_messages(
            stream,
            handler.clone(),
            AckPolicy::AckAlways,
            tx,
            Arc::new(PipelineMetrics::new()),
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(broker.queued("q").await, vec![b"waiting".to_vec()]);
    }
}
