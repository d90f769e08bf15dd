//! Queue-fed producers
//!
//! Each delivery becomes one job on the [`JobDispatcher`]. The handler waits
//! for a free worker, so a busy pool holds back the consumer.

use super::capability::{CapabilityQuery, QueryServices};
use super::versions::VersionsQuery;
use crate::adapters::broker::{MessageHandler, QueueTarget};
use crate::core::dispatcher::{Job, JobDispatcher, JobHandler};
use crate::domain::{CapabilityRequest, LanternError, RequestedVersion, Result, FINISHED_SENTINEL};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parses a `{url, requestVersion, defaultVersion}` payload
///
/// # Errors
///
/// Returns `LanternError::MalformedMessage` when the payload is not JSON or
/// `url` is missing or not a string.
pub fn parse_capability_request(payload: &[u8]) -> Result<CapabilityRequest> {
    serde_json::from_slice(payload).map_err(|e| {
        LanternError::MalformedMessage(format!("unable to parse capability request: {e}"))
    })
}

/// Settings shared by every job a handler submits
#[derive(Clone)]
pub struct JobSettings {
    pub dispatcher: Arc<JobDispatcher>,
    pub context: CancellationToken,
    pub duration: Duration,
    pub services: QueryServices,
}

impl JobSettings {
    async fn submit(&self, handler: Arc<dyn JobHandler>) -> Result<()> {
        let job = Job::new(self.context.clone(), self.duration, handler);
        self.dispatcher.add(job).await
    }
}

/// Handler for the capability-requests queue
pub struct CapabilityRequestHandler {
    settings: JobSettings,
    target: QueueTarget,
}

impl CapabilityRequestHandler {
    /// `target` is the capability-statements queue the jobs publish to
    pub fn new(settings: JobSettings, target: QueueTarget) -> Self {
        Self { settings, target }
    }
}

#[async_trait]
impl MessageHandler for CapabilityRequestHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        let request = parse_capability_request(payload)?;
        if request.is_finished_marker() {
            tracing::info!("Finished querying capability statements for this round");
            return Ok(());
        }

        let query = CapabilityQuery::new(
            request.url,
            RequestedVersion::new(request.request_version),
            request.default_version,
            self.settings.services.clone(),
            self.target.clone(),
        );
        self.settings.submit(Arc::new(query)).await
    }
}

/// Handler for the versions-requests queue; payloads are bare URLs
pub struct VersionsRequestHandler {
    settings: JobSettings,
    target: QueueTarget,
}

impl VersionsRequestHandler {
    /// `target` is the versions-responses queue the jobs publish to
    pub fn new(settings: JobSettings, target: QueueTarget) -> Self {
        Self { settings, target }
    }
}

#[async_trait]
impl MessageHandler for VersionsRequestHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        let url = std::str::from_utf8(payload)
            .map_err(|_| LanternError::MalformedMessage("URL is not valid UTF-8".to_string()))?
            .trim();
        if url.is_empty() {
            return Err(LanternError::MalformedMessage("URL is empty".to_string()));
        }
        if url == FINISHED_SENTINEL {
            tracing::info!("Finished requesting $versions for this round");
            return Ok(());
        }

        let query = VersionsQuery::new(url, self.settings.services.clone(), self.target.clone());
        self.settings.submit(Arc::new(query)).await
    }
}
