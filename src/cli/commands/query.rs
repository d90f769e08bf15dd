//! `query` command: the capability querier

use super::service::{load_or_report, log_shutdown, run_consumers, BrokerSession};
use crate::adapters::database::create_endpoint_store;
use crate::adapters::fhir::HttpFetcher;
use crate::core::consumer::ConsumerLoop;
use crate::core::dispatcher::JobDispatcher;
use crate::core::metrics::{register_metrics, PipelineMetrics};
use crate::core::querier::{
    CapabilityRequestHandler, JobSettings, Producer, QueryServices, VersionsRequestHandler,
};
use crate::core::sender::load_endpoint_list;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Also query every URL in this JSON endpoint list, without waiting for requests
    #[arg(long, value_name = "FILE")]
    pub endpoints: Option<String>,
}

impl QueryArgs {
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        let Some(config) = load_or_report(config_path) else {
            return Ok(2);
        };
        let endpoints = match &self.endpoints {
            Some(path) => match load_endpoint_list(path) {
                Ok(list) => list,
                Err(e) => {
                    eprintln!("❌ {e}");
                    return Ok(2);
                }
            },
            None => Vec::new(),
        };

        let queues = &config.queues;
        let session = BrokerSession::open(
            &config,
            &[
                queues.capability_requests.as_str(),
                queues.versions_requests.as_str(),
                queues.capability_statements.as_str(),
                queues.versions_responses.as_str(),
            ],
        )
        .await?;

        register_metrics();
        let metrics = Arc::new(PipelineMetrics::new());
        let services = QueryServices {
            fetcher: Arc::new(HttpFetcher::new(&config.querier)?),
            store: create_endpoint_store(&config).await?,
            request_delay: Duration::from_millis(config.querier.request_delay_ms),
        };

        let dispatcher = Arc::new(JobDispatcher::new(Arc::clone(&metrics)));
        dispatcher
            .start(cancel.clone(), config.querier.num_workers)
            .await?;

        let settings = JobSettings {
            dispatcher: Arc::clone(&dispatcher),
            context: cancel.clone(),
            duration: Duration::from_secs(config.querier.job_duration_seconds),
            services,
        };

        let seeding = (!endpoints.is_empty()).then(|| {
            let producer = Producer::new(
                settings.clone(),
                session.target(&queues.capability_statements),
            );
            tokio::spawn(async move { producer.run_list(&endpoints).await })
        });

        let loops = vec![
            ConsumerLoop::new(
                Arc::clone(&session.broker),
                session.channel,
                queues.capability_requests.as_str(),
                Arc::new(CapabilityRequestHandler::new(
                    settings.clone(),
                    session.target(&queues.capability_statements),
                )),
                config.receiver.ack_policy,
                Arc::clone(&metrics),
            ),
            ConsumerLoop::new(
                Arc::clone(&session.broker),
                session.channel,
                queues.versions_requests.as_str(),
                Arc::new(VersionsRequestHandler::new(
                    settings,
                    session.target(&queues.versions_responses),
                )),
                config.receiver.ack_policy,
                Arc::clone(&metrics),
            ),
        ];
        let clean = run_consumers(loops, &cancel).await;

        if let Some(handle) = seeding {
            match handle.await {
                Ok(Ok(submitted)) => tracing::info!(submitted, "Endpoint list submitted"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Endpoint list failed"),
                Err(e) => tracing::error!(error = %e, "Endpoint list task panicked"),
            }
        }

        dispatcher.stop().await?;
        session.close().await;
        log_shutdown("capabilityquerier", &metrics);
        Ok(if clean { 0 } else { 5 })
    }
}
