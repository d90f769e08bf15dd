//! `$versions` operation response
//!
//! The response lists the FHIR versions an endpoint supports and its default.
//! It drives which requested-version rows are expected to exist for a URL.

use serde::{Deserialize, Serialize};

/// Parsed response of the FHIR `$versions` operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsResponse {
    /// Advertised FHIR versions, in server order
    #[serde(default)]
    pub versions: Vec<String>,

    /// Default FHIR version of the server
    #[serde(default)]
    pub default: String,
}

impl VersionsResponse {
    /// Creates a response from advertised versions and a default
    pub fn new(versions: Vec<String>, default: impl Into<String>) -> Self {
        Self {
            versions,
            default: default.into(),
        }
    }

    /// True when the server advertised nothing
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.default.is_empty()
    }

    /// Versions advertised by the server
    pub fn supported_versions(&self) -> &[String] {
        &self.versions
    }

    /// Default version of the server, empty when unknown
    pub fn default_version(&self) -> &str {
        &self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions_response() {
        let vr: VersionsResponse =
            serde_json::from_str(r#"{"versions": ["3.0", "4.0"], "default": "4.0"}"#).unwrap();
        assert_eq!(vr.supported_versions(), ["3.0".to_string(), "4.0".to_string()]);
        assert_eq!(vr.default_version(), "4.0");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let vr: VersionsResponse = serde_json::from_str("{}").unwrap();
        assert!(vr.is_empty());
    }
}
