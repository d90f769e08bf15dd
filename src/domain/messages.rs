//! Wire messages exchanged over the broker
//!
//! All payloads are JSON. Field names match the queue contract shared with the
//! other Lantern services, so several fields keep their historical casing.

use crate::domain::versions::VersionsResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// URL published at the end of a round of endpoint requests
pub const FINISHED_SENTINEL: &str = "FINISHED";

/// Result of querying one endpoint, published to the capability-statement queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMessage {
    pub url: String,
    pub err: String,
    #[serde(rename = "mimeTypes")]
    pub mime_types: Vec<String>,
    #[serde(rename = "tlsVersion")]
    pub tls_version: String,
    #[serde(rename = "httpResponse")]
    pub http_response: i32,
    #[serde(rename = "capabilityStatement")]
    pub capability_statement: Option<Value>,
    #[serde(rename = "smarthttpResponse")]
    pub smart_http_response: i32,
    #[serde(rename = "smartResp")]
    pub smart_response: Option<Value>,
    #[serde(rename = "responseTime")]
    pub response_time: f64,
    #[serde(rename = "requestedFhirVersion")]
    pub requested_fhir_version: String,
    #[serde(rename = "defaultFhirVersion")]
    pub default_fhir_version: String,
}

/// Result of the `$versions` operation, published to the versions-response queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionsMessage {
    pub url: String,
    #[serde(default)]
    pub err: String,
    #[serde(rename = "versionsResponse", default)]
    pub versions_response: VersionsResponse,
}

/// Request to query one endpoint at one FHIR version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub url: String,
    #[serde(rename = "requestVersion", default)]
    pub request_version: String,
    #[serde(rename = "defaultVersion", default)]
    pub default_version: String,
}

impl CapabilityRequest {
    /// True for the end-of-round marker
    pub fn is_finished_marker(&self) -> bool {
        self.url == FINISHED_SENTINEL
    }
}
