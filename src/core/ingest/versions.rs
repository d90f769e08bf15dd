//! `$versions` response ingestion
//!
//! Stores the advertised versions for a URL, prunes endpoint rows for
//! versions no longer advertised and requests a capability query for every
//! version that is.

use crate::adapters::broker::{MessageHandler, QueueTarget};
use crate::adapters::database::EndpointStore;
use crate::core::metrics::PipelineMetrics;
use crate::domain::{
    CapabilityRequest, HistoryOperation, LanternError, RequestedVersion, Result,
    VersionsResponse,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Parses `{url, versionsResponse}`
///
/// A missing or null `versionsResponse` is an empty response.
///
/// # Errors
///
/// Returns `LanternError::MalformedMessage` naming `url` or `versionsResponse`.
pub fn parse_versions_message(payload: &[u8]) -> Result<(String, VersionsResponse)> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| LanternError::MalformedMessage(format!("payload is not valid JSON: {e}")))?;

    let url = value
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| LanternError::MalformedMessage("field 'url' must be a string".to_string()))?
        .to_string();

    let response = match value.get("versionsResponse") {
        None | Some(Value::Null) => VersionsResponse::default(),
        Some(vr) => serde_json::from_value(vr.clone()).map_err(|e| {
            LanternError::MalformedMessage(format!(
                "{url}: field 'versionsResponse' is invalid: {e}"
            ))
        })?,
    };
    Ok((url, response))
}

/// Handler for the versions-responses queue
pub struct VersionsIngestHandler {
    store: Arc<dyn EndpointStore>,
    publisher: QueueTarget,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
}

impl VersionsIngestHandler {
    /// `publisher` is the capability-requests queue
    pub fn new(
        store: Arc<dyn EndpointStore>,
        publisher: QueueTarget,
        cancel: CancellationToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            cancel,
            metrics,
        }
    }

    /// Applies one versions message and returns the requests it published
    pub async fn ingest(&self, payload: &[u8]) -> Result<Vec<CapabilityRequest>> {
        let (url, response) = parse_versions_message(payload)?;

        let previous = self.store.get_versions_response(&url).await?;
        if previous.as_ref() != Some(&response) {
            self.store.save_versions_response(&url, &response).await?;
        }

        let mut supported: Vec<String> = response.supported_versions().to_vec();
        supported.push(RequestedVersion::NONE.to_string());
        let keep: Vec<RequestedVersion> = supported.iter().map(RequestedVersion::new).collect();

        let stale = self.store.infos_with_other_versions(&url, &keep).await?;
        for info in stale {
            self.store.delete_info(&info).await?;
            if let Some(metadata_id) = info.metadata_id {
                self.store
                    .append_history(&info, metadata_id, HistoryOperation::Delete)
                    .await?;
            }
            self.metrics.record_info_pruned();
            tracing::info!(
                url = %url,
                version = %info.requested_fhir_version,
                "Removed endpoint info for version no longer advertised"
            );
        }

        let mut sent = Vec::with_capacity(supported.len());
        for version in supported {
            let request = CapabilityRequest {
                url: url.clone(),
                request_version: version,
                default_version: response.default_version().to_string(),
            };
            let body = serde_json::to_vec(&request)?;
            self.publisher.send(&self.cancel, &body).await?;
            sent.push(request);
        }

        tracing::debug!(url = %url, requests = sent.len(), queue = %self.publisher.queue(), "Capability queries requested");
        Ok(sent)
    }
}

#[async_trait]
impl MessageHandler for VersionsIngestHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        self.ingest(payload).await.map(|_| ())
    }
}
