//! `send` command: the endpoint sender

use super::service::{load_or_report, BrokerSession};
use crate::core::sender::{load_endpoint_list, EndpointSender};
use clap::Args;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arguments for the send command
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint list to send instead of `sender.endpoints_file`
    #[arg(long, value_name = "FILE")]
    pub endpoints: Option<String>,

    /// Send a single round even if an interval is configured
    #[arg(long)]
    pub once: bool,
}

impl SendArgs {
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        let Some(config) = load_or_report(config_path) else {
            return Ok(2);
        };
        let Some(path) = self.endpoints.as_ref().or(config.sender.endpoints_file.as_ref()) else {
            eprintln!("❌ No endpoint list: set sender.endpoints_file or pass --endpoints");
            return Ok(2);
        };
        let endpoints = match load_endpoint_list(path) {
            Ok(list) => list,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };
        tracing::info!(path = %path, count = endpoints.len(), "Loaded endpoint list");

        let queue = config.queues.versions_requests.as_str();
        let session = BrokerSession::open(&config, &[queue]).await?;

        let interval = match config.sender.interval_minutes {
            0 => None,
            _ if self.once => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        };
        let sender = EndpointSender::new(
            session.target(queue),
            Duration::from_millis(config.sender.enqueue_delay_ms),
            interval,
        );
        let outcome = sender.run(&endpoints, &cancel).await;

        session.close().await;
        outcome?;
        tracing::info!("Endpoint sender finished");
        Ok(0)
    }
}
