//! Endpoint state models
//!
//! [`EndpointInfo`] is the current recorded state of one FHIR endpoint at one
//! requested FHIR version. [`EndpointMetadata`] is the immutable record of a
//! single observation, and [`HistoryEntry`] is one row of the append-only log of
//! info transitions.

use crate::domain::ids::{InfoId, MetadataId, ProductId, RequestedVersion, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-observation telemetry for an endpoint
///
/// Every accepted capability message produces exactly one metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointMetadata {
    /// Row identifier, set once persisted
    pub id: Option<MetadataId>,

    /// Endpoint URL as it was queried
    pub url: String,

    /// HTTP status of the capability statement request
    pub http_response: i32,

    /// Error text reported by the querier (empty when none)
    pub errors: String,

    /// Round-trip time of the capability statement request, in seconds
    pub response_time_seconds: f64,

    /// HTTP status of the SMART well-known request
    pub smart_http_response: i32,

    /// FHIR version that was requested
    pub requested_fhir_version: RequestedVersion,

    /// When the observation was recorded
    pub created_at: DateTime<Utc>,
}

impl EndpointMetadata {
    /// Creates an unsaved metadata record stamped with the current time
    pub fn new(url: impl Into<String>, requested_fhir_version: RequestedVersion) -> Self {
        Self {
            id: None,
            url: url.into(),
            http_response: 0,
            errors: String::new(),
            response_time_seconds: 0.0,
            smart_http_response: 0,
            requested_fhir_version,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of one validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule_name: String,
    pub valid: bool,
    pub expected: String,
    pub actual: String,
    pub comment: String,
    pub reference: String,
}

/// Validation results attached to an endpoint info row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub results: Vec<ValidationRule>,
    pub warnings: Vec<ValidationRule>,
}

impl Validation {
    /// True when every rule passed
    pub fn all_valid(&self) -> bool {
        self.results.iter().all(|rule| rule.valid)
    }
}

/// Current state of one endpoint at one requested FHIR version
///
/// Keyed by `(url, requested_fhir_version)`. The `metadata` field carries the
/// observation that produced this state; `metadata_id` is the persisted row it
/// currently points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Row identifier, set once persisted
    pub id: Option<InfoId>,

    pub url: String,
    pub requested_fhir_version: RequestedVersion,
    pub tls_version: String,
    pub mime_types: Vec<String>,
    pub capability_statement: Option<Value>,
    pub capability_statement_bytes: Option<Vec<u8>>,
    pub validation: Validation,
    pub smart_response: Option<Value>,
    pub smart_response_bytes: Option<Vec<u8>>,

    /// Which standard CapabilityStatement fields are populated
    pub included_fields: BTreeMap<String, bool>,

    /// Interaction code to the resource types that declare it
    pub operation_resource: BTreeMap<String, Vec<String>>,

    pub vendor_id: Option<VendorId>,
    pub healthit_product_id: Option<ProductId>,

    /// `fhirVersion` advertised in the capability statement
    pub capability_fhir_version: String,

    /// Persisted metadata row this info currently references
    pub metadata_id: Option<MetadataId>,

    /// Observation carried along with this state
    pub metadata: EndpointMetadata,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EndpointInfo {
    /// Creates an empty info record for the given key
    pub fn new(url: impl Into<String>, requested_fhir_version: RequestedVersion) -> Self {
        let url = url.into();
        Self {
            id: None,
            metadata: EndpointMetadata::new(url.clone(), requested_fhir_version.clone()),
            url,
            requested_fhir_version,
            tls_version: String::new(),
            mime_types: Vec::new(),
            capability_statement: None,
            capability_statement_bytes: None,
            validation: Validation::default(),
            smart_response: None,
            smart_response_bytes: None,
            included_fields: BTreeMap::new(),
            operation_resource: BTreeMap::new(),
            vendor_id: None,
            healthit_product_id: None,
            capability_fhir_version: String::new(),
            metadata_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Compares capability content, ignoring identifiers, metadata and timestamps
    ///
    /// Two infos that are equal under this comparison differ only in telemetry,
    /// so a refresh can relink metadata without re-running vendor matching.
    pub fn equal_excluding_metadata(&self, other: &EndpointInfo) -> bool {
        self.url == other.url
            && self.requested_fhir_version == other.requested_fhir_version
            && self.tls_version == other.tls_version
            && self.mime_types == other.mime_types
            && self.capability_statement == other.capability_statement
            && self.capability_statement_bytes == other.capability_statement_bytes
            && self.validation == other.validation
            && self.smart_response == other.smart_response
            && self.smart_response_bytes == other.smart_response_bytes
            && self.included_fields == other.included_fields
            && self.operation_resource == other.operation_resource
            && self.vendor_id == other.vendor_id
            && self.healthit_product_id == other.healthit_product_id
            && self.capability_fhir_version == other.capability_fhir_version
    }

    /// Copies the capability content of `other` into self, keeping identity and metadata
    pub fn take_content_from(&mut self, other: &EndpointInfo) {
        self.tls_version = other.tls_version.clone();
        self.mime_types = other.mime_types.clone();
        self.capability_statement = other.capability_statement.clone();
        self.capability_statement_bytes = other.capability_statement_bytes.clone();
        self.validation = other.validation.clone();
        self.smart_response = other.smart_response.clone();
        self.smart_response_bytes = other.smart_response_bytes.clone();
        self.included_fields = other.included_fields.clone();
        self.operation_resource = other.operation_resource.clone();
        self.capability_fhir_version = other.capability_fhir_version.clone();
    }
}

/// Kind of transition recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryOperation {
    /// Row first created
    Insert,
    /// Content change or telemetry refresh
    Update,
    /// Row removed from current state
    Delete,
}

impl HistoryOperation {
    /// Single-letter code stored in the history table
    pub fn code(&self) -> &'static str {
        match self {
            HistoryOperation::Insert => "I",
            HistoryOperation::Update => "U",
            HistoryOperation::Delete => "D",
        }
    }
}

/// One immutable row of the endpoint info history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operation: HistoryOperation,
    pub entered_at: DateTime<Utc>,
    pub metadata_id: MetadataId,
    pub info: EndpointInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_info() -> EndpointInfo {
        let mut info = EndpointInfo::new("https://fhir.example.com", RequestedVersion::none());
        info.tls_version = "TLS 1.2".to_string();
        info.mime_types = vec!["application/fhir+json".to_string()];
        info.capability_statement = Some(json!({"fhirVersion": "4.0.1"}));
        info.capability_fhir_version = "4.0.1".to_string();
        info
    }

    #[test]
    fn test_equal_excluding_metadata_ignores_telemetry() {
        let a = sample_info();
        let mut b = sample_info();
        b.metadata.http_response = 500;
        b.metadata.response_time_seconds = 9.5;
        b.metadata_id = Some(MetadataId::new(42));
        b.id = Some(InfoId::new(1));
        b.updated_at = Some(Utc::now());
        assert!(a.equal_excluding_metadata(&b));
    }

    #[test]
    fn test_equal_excluding_metadata_detects_content_change() {
        let a = sample_info();
        let mut b = sample_info();
        b.tls_version = "TLS 1.3".to_string();
        assert!(!a.equal_excluding_metadata(&b));

        let mut c = sample_info();
        c.capability_statement = Some(json!({"fhirVersion": "3.0.2"}));
        assert!(!a.equal_excluding_metadata(&c));
    }

    #[test]
    fn test_take_content_from_keeps_identity() {
        let mut stored = sample_info();
        stored.id = Some(InfoId::new(5));
        stored.vendor_id = Some(VendorId::new(9));

        let mut incoming = sample_info();
        incoming.tls_version = "TLS 1.3".to_string();

        stored.take_content_from(&incoming);
        assert_eq!(stored.tls_version, "TLS 1.3");
        assert_eq!(stored.id, Some(InfoId::new(5)));
        assert_eq!(stored.vendor_id, Some(VendorId::new(9)));
    }

    #[test]
    fn test_history_operation_codes() {
        assert_eq!(HistoryOperation::Insert.code(), "I");
        assert_eq!(HistoryOperation::Update.code(), "U");
        assert_eq!(HistoryOperation::Delete.code(), "D");
    }
}
