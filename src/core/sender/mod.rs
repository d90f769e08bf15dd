//! Endpoint sender
//!
//! Publishes the endpoint list to the versions-requests queue in random
//! order, one URL at a time, followed by the end-of-round marker.

use crate::adapters::broker::QueueTarget;
use crate::domain::{LanternError, Result, FINISHED_SENTINEL};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reads a JSON endpoint list
///
/// Entries are either URL strings or objects with a `URL` (or `url`) field,
/// the shape of published endpoint directories. Blank entries are skipped.
///
/// # Errors
///
/// Returns `LanternError::Io` if the file cannot be read and
/// `LanternError::Validation` if it is not a JSON array of endpoints.
pub fn load_endpoint_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    parse_endpoint_list(&contents).map_err(|e| {
        LanternError::Validation(format!("endpoint list {}: {e}", path.display()))
    })
}

fn parse_endpoint_list(contents: &str) -> std::result::Result<Vec<String>, String> {
    let value: Value = serde_json::from_str(contents).map_err(|e| e.to_string())?;
    let entries = value
        .as_array()
        .ok_or_else(|| "expected a JSON array".to_string())?;

    let mut urls = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let url = match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("URL")
                .or_else(|| obj.get("url"))
                .and_then(Value::as_str),
            _ => None,
        }
        .ok_or_else(|| format!("entry {i} is not a URL"))?;

        let url = url.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// Periodic publisher of endpoint URLs
pub struct EndpointSender {
    target: QueueTarget,
    enqueue_delay: Duration,
    interval: Option<Duration>,
}

impl EndpointSender {
    /// `interval` of `None` means a single pass
    pub fn new(target: QueueTarget, enqueue_delay: Duration, interval: Option<Duration>) -> Self {
        Self {
            target,
            enqueue_delay,
            interval,
        }
    }

    /// Publishes every URL once, shuffled, then the end-of-round marker
    ///
    /// Returns the number of URLs published.
    ///
    /// # Errors
    ///
    /// Returns `DispatcherError::Cancelled` when `cancel` fires mid-round, or
    /// the broker's publish error.
    pub async fn send_round(&self, endpoints: &[String], cancel: &CancellationToken) -> Result<usize> {
        let mut order: Vec<&String> = endpoints.iter().collect();
        order.shuffle(&mut rand::thread_rng());

        let mut sent = 0;
        for url in order {
            self.target.send(cancel, url.as_bytes()).await?;
            sent += 1;
            tokio::select! {
                _ = tokio::time::sleep(self.enqueue_delay) => {}
                _ = cancel.cancelled() => break,
            }
        }
        self.target.send(cancel, FINISHED_SENTINEL.as_bytes()).await?;

        tracing::info!(queue = %self.target.queue(), sent, "Sent endpoints for versions requests");
        Ok(sent)
    }

    /// Sends rounds until `cancel` fires, or once when no interval is set
    ///
    /// # Errors
    ///
    /// Returns the first publish error. Cancellation is a clean exit.
    pub async fn run(&self, endpoints: &[String], cancel: &CancellationToken) -> Result<()> {
        loop {
            match self.send_round(endpoints, cancel).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => return Ok(()),
                Err(e) => return Err(e),
            }

            let Some(interval) = self.interval else {
                return Ok(());
            };
            tracing::info!(minutes = interval.as_secs() / 60, "Waiting for next round");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}
