//! FHIR server access
//!
//! [`HttpFetcher`] performs the outbound GETs; the `url` helpers build the
//! metadata, SMART well-known and `$versions` URLs from an endpoint base URL.

pub mod fetcher;
pub mod url;

pub use fetcher::{
    is_json_mime_type, CapabilityFetcher, FetchResponse, HttpFetcher, FHIR2_LESS_JSON_MIME_TYPE,
    FHIR3_PLUS_JSON_MIME_TYPE, NO_TLS, TLS_VERSION_UNKNOWN,
};
pub use self::url::{metadata_url, normalize_url, versions_url, well_known_url};
