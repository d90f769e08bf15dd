//! `receive` command: the capability receiver

use super::service::{load_or_report, log_shutdown, run_consumers, BrokerSession};
use crate::adapters::chpl::PublisherMatcher;
use crate::adapters::database::create_endpoint_store;
use crate::core::consumer::ConsumerLoop;
use crate::core::ingest::{CapabilityIngestHandler, VersionsIngestHandler};
use crate::core::metrics::{register_metrics, PipelineMetrics};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments for the receive command
#[derive(Args, Debug)]
pub struct ReceiveArgs {}

impl ReceiveArgs {
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        let Some(config) = load_or_report(config_path) else {
            return Ok(2);
        };

        let queues = &config.queues;
        let session = BrokerSession::open(
            &config,
            &[
                queues.capability_statements.as_str(),
                queues.versions_responses.as_str(),
                queues.capability_requests.as_str(),
            ],
        )
        .await?;

        register_metrics();
        let metrics = Arc::new(PipelineMetrics::new());
        let store = create_endpoint_store(&config).await?;

        let capability = CapabilityIngestHandler::new(
            Arc::clone(&store),
            Arc::new(PublisherMatcher::new()),
            config.receiver.product_mapping_file.as_ref().map(PathBuf::from),
            Arc::clone(&metrics),
        );
        let versions = VersionsIngestHandler::new(
            store,
            session.target(&queues.capability_requests),
            cancel.clone(),
            Arc::clone(&metrics),
        );

        let loops = vec![
            ConsumerLoop::new(
                Arc::clone(&session.broker),
                session.channel,
                queues.capability_statements.as_str(),
                Arc::new(capability),
                config.receiver.ack_policy,
                Arc::clone(&metrics),
            ),
            ConsumerLoop::new(
                Arc::clone(&session.broker),
                session.channel,
                queues.versions_responses.as_str(),
                Arc::new(versions),
                config.receiver.ack_policy,
                Arc::clone(&metrics),
            ),
        ];
        let clean = run_consumers(loops, &cancel).await;

        session.close().await;
        log_shutdown("capabilityreceiver", &metrics);
        Ok(if clean { 0 } else { 5 })
    }
}
