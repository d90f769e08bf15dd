//! Endpoint store abstraction
//!
//! This module defines the trait that persistence backends implement to hold
//! the current endpoint state, its observation metadata and the append-only
//! history log.

use crate::domain::{
    EndpointInfo, EndpointMetadata, HistoryOperation, InfoId, MetadataId, RequestedVersion,
    Result, VendorId, VersionsResponse,
};
use async_trait::async_trait;

/// Persistence for endpoint capability state
///
/// Rows are keyed by `(url, requested_fhir_version)`. Implementations do not
/// wrap multi-step sequences in a transaction; the ingestion algorithm issues
/// each step separately.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Creates tables and indexes if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Current info row for the composite key, with its metadata loaded
    ///
    /// # Errors
    ///
    /// Returns `LanternError::Storage` if the lookup fails. A missing row is
    /// `Ok(None)`.
    async fn get_current_info(
        &self,
        url: &str,
        version: &RequestedVersion,
    ) -> Result<Option<EndpointInfo>>;

    /// Persists a new observation and returns its identifier
    async fn insert_metadata(&self, metadata: &EndpointMetadata) -> Result<MetadataId>;

    /// Inserts a new info row pointing at `metadata_id`
    ///
    /// # Errors
    ///
    /// Returns an error if a row with the same key already exists.
    async fn insert_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<InfoId>;

    /// Overwrites the content of the row with the same key
    async fn update_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<()>;

    /// Points an existing info row at a new metadata row, leaving content untouched
    async fn relink_metadata(&self, info_id: InfoId, metadata_id: MetadataId) -> Result<()>;

    /// Removes the row with the key of `info` from current state
    async fn delete_info(&self, info: &EndpointInfo) -> Result<()>;

    /// Appends one row to the history log
    async fn append_history(
        &self,
        info: &EndpointInfo,
        metadata_id: MetadataId,
        operation: HistoryOperation,
    ) -> Result<()>;

    /// Info rows for `url` whose requested version is not in `keep`
    async fn infos_with_other_versions(
        &self,
        url: &str,
        keep: &[RequestedVersion],
    ) -> Result<Vec<EndpointInfo>>;

    /// Last stored `$versions` response for `url`
    async fn get_versions_response(&self, url: &str) -> Result<Option<VersionsResponse>>;

    /// Stores the `$versions` response for `url`, replacing any previous value
    async fn save_versions_response(&self, url: &str, response: &VersionsResponse) -> Result<()>;

    /// Vendor whose name equals `name`, ignoring case and surrounding whitespace
    async fn find_vendor_by_name(&self, name: &str) -> Result<Option<VendorId>>;

    /// MIME types last recorded for `url` at any requested version
    async fn mime_types_for(&self, url: &str) -> Result<Vec<String>>;
}
