//! Wiring shared by the long-running commands

use crate::adapters::broker::{
    connect_to_queue, BrokerCredentials, MessageBroker, QueueTarget, RabbitMqBroker,
};
use crate::config::{load_config, LanternConfig};
use crate::core::consumer::ConsumerLoop;
use crate::core::metrics::PipelineMetrics;
use crate::domain::ChannelId;
use anyhow::Context;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Loads the configuration, printing the problem on failure
pub fn load_or_report(config_path: &str) -> Option<LanternConfig> {
    match load_config(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "Configuration could not be loaded");
            eprintln!("❌ {e}");
            None
        }
    }
}

/// An open broker channel with every queue the command uses checked
pub struct BrokerSession {
    pub broker: Arc<dyn MessageBroker>,
    pub channel: ChannelId,
}

impl BrokerSession {
    /// Connects, opens one channel, applies the prefetch count and checks `queues` exist
    pub async fn open(config: &LanternConfig, queues: &[&str]) -> anyhow::Result<Self> {
        let credentials = BrokerCredentials::from_config(&config.broker);
        let broker = RabbitMqBroker::connect(&credentials, &config.broker.host, config.broker.port)
            .await
            .with_context(|| {
                format!(
                    "could not connect to broker at {}:{}",
                    config.broker.host, config.broker.port
                )
            })?;
        let broker: Arc<dyn MessageBroker> = Arc::new(broker);
        let channel = broker.create_channel().await?;
        broker
            .set_prefetch(channel, config.broker.prefetch_count)
            .await?;
        for queue in queues {
            connect_to_queue(broker.as_ref(), channel, queue).await?;
        }
        tracing::info!(host = %config.broker.host, queues = ?queues, "Connected to broker");
        Ok(Self { broker, channel })
    }

    pub fn target(&self, queue: &str) -> QueueTarget {
        QueueTarget::new(Arc::clone(&self.broker), self.channel, queue)
    }

    pub async fn close(&self) {
        if let Err(e) = self.broker.close().await {
            tracing::warn!(error = %e, "Broker did not close cleanly");
        }
    }
}

/// Runs every loop until all have returned
///
/// A loop that fails cancels `cancel`, stopping its siblings. Returns false
/// if any loop failed.
pub async fn run_consumers(loops: Vec<ConsumerLoop>, cancel: &CancellationToken) -> bool {
    let runs = loops.iter().map(|consumer| {
        let cancel = cancel.clone();
        async move {
            let result = consumer.run(cancel.clone()).await;
            if let Err(e) = &result {
                tracing::error!(queue = %consumer.queue(), error = %e, "Consumer failed");
                cancel.cancel();
            }
            result.is_ok()
        }
    });
    join_all(runs).await.into_iter().all(|ok| ok)
}

/// Logs the final counters for `service`
pub fn log_shutdown(service: &str, metrics: &PipelineMetrics) {
    metrics.snapshot().log(service);
    tracing::info!(service, "Shut down");
}
