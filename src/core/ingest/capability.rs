//! Capability-statement ingestion
//!
//! Reconciles one parsed capability message against the stored state for its
//! `(url, requested_fhir_version)` key.

use super::parse::parse_capability_message;
use crate::adapters::broker::MessageHandler;
use crate::adapters::chpl::EndpointMatcher;
use crate::adapters::database::EndpointStore;
use crate::core::metrics::PipelineMetrics;
use crate::domain::{EndpointInfo, HistoryOperation, LanternError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Which path a message took through the upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First sighting of the key
    Inserted,
    /// Content changed; the row was rewritten in place and re-matched
    Updated,
    /// Content unchanged; only the metadata reference moved
    Refreshed,
}

/// Handler for the capability-statements queue
pub struct CapabilityIngestHandler {
    store: Arc<dyn EndpointStore>,
    matcher: Arc<dyn EndpointMatcher>,
    mapping_file: Option<PathBuf>,
    metrics: Arc<PipelineMetrics>,
}

impl CapabilityIngestHandler {
    pub fn new(
        store: Arc<dyn EndpointStore>,
        matcher: Arc<dyn EndpointMatcher>,
        mapping_file: Option<PathBuf>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            store,
            matcher,
            mapping_file,
            metrics,
        }
    }

    /// Parses `payload` and applies it to the store
    ///
    /// The steps are not wrapped in a transaction. Two deliveries for the same
    /// key processed concurrently by different consumers can interleave.
    ///
    /// # Errors
    ///
    /// Returns `LanternError::MalformedMessage` for a bad payload,
    /// `LanternError::Match` when vendor or product matching fails, or the
    /// store's error.
    pub async fn ingest(&self, payload: &[u8]) -> Result<IngestOutcome> {
        let parsed = parse_capability_message(payload)?;
        let mut incoming = parsed.info;

        let existing = self
            .store
            .get_current_info(&incoming.url, &incoming.requested_fhir_version)
            .await?;

        let outcome = match existing {
            None => {
                self.match_endpoint(&mut incoming).await?;
                let metadata_id = self.store.insert_metadata(&incoming.metadata).await?;
                let info_id = self.store.insert_info(&incoming, metadata_id).await?;
                incoming.id = Some(info_id);
                incoming.metadata_id = Some(metadata_id);
                self.store
                    .append_history(&incoming, metadata_id, HistoryOperation::Insert)
                    .await?;
                self.metrics.record_info_inserted();
                IngestOutcome::Inserted
            }
            Some(mut stored) => {
                // Matching results are not part of the message
                incoming.vendor_id = stored.vendor_id;
                incoming.healthit_product_id = stored.healthit_product_id;
                stored.metadata = incoming.metadata.clone();

                if stored.equal_excluding_metadata(&incoming) {
                    let info_id = stored.id.ok_or_else(|| {
                        LanternError::Storage(format!("stored info for {} has no id", stored.url))
                    })?;
                    let metadata_id = self.store.insert_metadata(&stored.metadata).await?;
                    self.store.relink_metadata(info_id, metadata_id).await?;
                    stored.metadata_id = Some(metadata_id);
                    self.store
                        .append_history(&stored, metadata_id, HistoryOperation::Update)
                        .await?;
                    self.metrics.record_info_refreshed();
                    IngestOutcome::Refreshed
                } else {
                    stored.take_content_from(&incoming);
                    self.match_endpoint(&mut stored).await?;
                    let metadata_id = self.store.insert_metadata(&stored.metadata).await?;
                    self.store.update_info(&stored, metadata_id).await?;
                    stored.metadata_id = Some(metadata_id);
                    self.store
                        .append_history(&stored, metadata_id, HistoryOperation::Update)
                        .await?;
                    self.metrics.record_info_updated();
                    IngestOutcome::Updated
                }
            }
        };

        crate::log_pipeline_stage!(
            "ingest",
            incoming.url,
            incoming.requested_fhir_version
        );
        tracing::debug!(url = %incoming.url, outcome = ?outcome, "Capability message applied");
        Ok(outcome)
    }

    async fn match_endpoint(&self, info: &mut EndpointInfo) -> Result<()> {
        let cs = info.capability_statement.as_ref();
        info.vendor_id = self
            .matcher
            .match_vendor(cs, self.store.as_ref())
            .await
            .map_err(|e| LanternError::matching(&info.url, format!("match endpoint to vendor failed: {e}")))?;
        info.healthit_product_id = self
            .matcher
            .match_product(cs, self.store.as_ref(), self.mapping_file.as_deref())
            .await
            .map_err(|e| LanternError::matching(&info.url, format!("match endpoint to product failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CapabilityIngestHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        self.ingest(payload).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::chpl::PublisherMatcher;
    use crate::adapters::database::InMemoryEndpointStore;
    use crate::domain::{
        EndpointMetadata, InfoId, MetadataId, ProductId, RequestedVersion, VendorId,
        VersionsResponse,
    };
    use serde_json::{json, Value};

    fn message(tls: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "url": "https://fhir.example.com/r4",
            "err": "",
            "tlsVersion": tls,
            "requestedFhirVersion": "4.0",
            "defaultFhirVersion": "4.0",
            "mimeTypes": ["application/fhir+json"],
            "httpResponse": 200,
            "smarthttpResponse": 404,
            "capabilityStatement": {"fhirVersion": "4.0.1", "publisher": "Example Health"},
            "responseTime": 0.5
        }))
        .unwrap()
    }

    struct CountingMatcher {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl EndpointMatcher for CountingMatcher {
        async fn match_vendor(
            &self,
            _cs: Option<&Value>,
            _store: &dyn EndpointStore,
        ) -> Result<Option<VendorId>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Some(VendorId::new(1)))
        }

        async fn match_product(
            &self,
            _cs: Option<&Value>,
            _store: &dyn EndpointStore,
            _mapping_file: Option<&std::path::Path>,
        ) -> Result<Option<ProductId>> {
            Ok(None)
        }
    }

    struct FailingMatcher;

    #[async_trait]
    impl EndpointMatcher for FailingMatcher {
        async fn match_vendor(
            &self,
            _cs: Option<&Value>,
            _store: &dyn EndpointStore,
        ) -> Result<Option<VendorId>> {
            Err(LanternError::Storage("vendors table unavailable".to_string()))
        }

        async fn match_product(
            &self,
            _cs: Option<&Value>,
            _store: &dyn EndpointStore,
            _mapping_file: Option<&std::path::Path>,
        ) -> Result<Option<ProductId>> {
            Ok(None)
        }
    }

    fn handler(
        store: Arc<InMemoryEndpointStore>,
        matcher: Arc<dyn EndpointMatcher>,
    ) -> CapabilityIngestHandler {
        CapabilityIngestHandler::new(store, matcher, None, Arc::new(PipelineMetrics::new()))
    }

    #[tokio::test]
    async fn test_three_paths() {
        let store = Arc::new(InMemoryEndpointStore::new());
        let matcher = Arc::new(CountingMatcher {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let h = handler(store.clone(), matcher.clone());

        assert_eq!(h.ingest(&message("TLS 1.2")).await.unwrap(), IngestOutcome::Inserted);
        assert_eq!(h.ingest(&message("TLS 1.2")).await.unwrap(), IngestOutcome::Refreshed);
        assert_eq!(h.ingest(&message("TLS 1.3")).await.unwrap(), IngestOutcome::Updated);

        // Refresh skips matching
        assert_eq!(matcher.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(store.metadata_rows().await.len(), 3);

        let ops: Vec<HistoryOperation> =
            store.history_rows().await.iter().map(|h| h.operation).collect();
        assert_eq!(
            ops,
            vec![HistoryOperation::Insert, HistoryOperation::Update, HistoryOperation::Update]
        );

        let rows = store.info_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tls_version, "TLS 1.3");
        assert_eq!(rows[0].vendor_id, Some(VendorId::new(1)));
        assert_eq!(rows[0].requested_fhir_version, RequestedVersion::new("4.0"));
    }

    /// Delegates to the in-memory store but refuses every content update
    struct UpdateRefusingStore {
        inner: InMemoryEndpointStore,
    }

    #[async_trait]
    impl EndpointStore for UpdateRefusingStore {
        async fn ensure_schema(&self) -> Result<()> {
            self.inner.ensure_schema().await
        }
        async fn get_current_info(
            &self,
            url: &str,
            version: &RequestedVersion,
        ) -> Result<Option<EndpointInfo>> {
            self.inner.get_current_info(url, version).await
        }
        async fn insert_metadata(&self, metadata: &EndpointMetadata) -> Result<MetadataId> {
            self.inner.insert_metadata(metadata).await
        }
        async fn insert_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<InfoId> {
            self.inner.insert_info(info, metadata_id).await
        }
        async fn update_info(&self, _info: &EndpointInfo, _metadata_id: MetadataId) -> Result<()> {
            Err(LanternError::Storage("transient".to_string()))
        }
        async fn relink_metadata(&self, info_id: InfoId, metadata_id: MetadataId) -> Result<()> {
            self.inner.relink_metadata(info_id, metadata_id).await
        }
        async fn delete_info(&self, info: &EndpointInfo) -> Result<()> {
            self.inner.delete_info(info).await
        }
        async fn append_history(
            &self,
            info: &EndpointInfo,
            metadata_id: MetadataId,
            operation: HistoryOperation,
        ) -> Result<()> {
            self.inner.append_history(info, metadata_id, operation).await
        }
        async fn infos_with_other_versions(
            &self,
            url: &str,
            keep: &[RequestedVersion],
        ) -> Result<Vec<EndpointInfo>> {
            self.inner.infos_with_other_versions(url, keep).await
        }
        async fn get_versions_response(&self, url: &str) -> Result<Option<VersionsResponse>> {
            self.inner.get_versions_response(url).await
        }
        async fn save_versions_response(&self, url: &str, response: &VersionsResponse) -> Result<()> {
            self.inner.save_versions_response(url, response).await
        }
        async fn find_vendor_by_name(&self, name: &str) -> Result<Option<VendorId>> {
            self.inner.find_vendor_by_name(name).await
        }
        async fn mime_types_for(&self, url: &str) -> Result<Vec<String>> {
            self.inner.mime_types_for(url).await
        }
    }

    #[tokio::test]
    async fn test_full_update_keeps_row_id() {
        let store = Arc::new(InMemoryEndpointStore::new());
        let h = handler(store.clone(), Arc::new(PublisherMatcher::new()));

        h.ingest(&message("TLS 1.2")).await.unwrap();
        let first = store.info_rows().await[0].id;
        assert_eq!(h.ingest(&message("TLS 1.3")).await.unwrap(), IngestOutcome::Updated);

        let rows = store.info_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[0].tls_version, "TLS 1.3");
    }

    #[tokio::test]
    async fn test_failed_update_leaves_current_row() {
        let store = Arc::new(UpdateRefusingStore {
            inner: InMemoryEndpointStore::new(),
        });
        let h = CapabilityIngestHandler::new(
            store.clone(),
            Arc::new(PublisherMatcher::new()),
            None,
            Arc::new(PipelineMetrics::new()),
        );

        h.ingest(&message("TLS 1.2")).await.unwrap();
        let err = h.ingest(&message("TLS 1.3")).await.unwrap_err();
        assert!(matches!(err, LanternError::Storage(_)));

        let current = store
            .get_current_info("https://fhir.example.com/r4", &RequestedVersion::new("4.0"))
            .await
            .unwrap()
            .expect("row should survive a failed update");
        assert_eq!(current.tls_version, "TLS 1.2");
    }

    #[tokio::test]
    async fn test_publisher_matcher_links_vendor() {
        let store = Arc::new(InMemoryEndpointStore::new());
        let vendor = store.add_vendor("Example Health").await;
        let h = handler(store.clone(), Arc::new(PublisherMatcher::new()));

        h.ingest(&message("TLS 1.2")).await.unwrap();
        assert_eq!(store.info_rows().await[0].vendor_id, Some(vendor));
    }

    #[tokio::test]
    async fn test_match_failure_carries_url() {
        let store = Arc::new(InMemoryEndpointStore::new());
        let h = handler(store.clone(), Arc::new(FailingMatcher));

        let err = h.ingest(&message("TLS 1.2")).await.unwrap_err();
        match err {
            LanternError::Match { url, .. } => assert_eq!(url, "https://fhir.example.com/r4"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.info_rows().await.is_empty());
        assert!(store.metadata_rows().await.is_empty());
    }
}
