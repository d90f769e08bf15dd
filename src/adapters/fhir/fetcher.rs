//! HTTP access to FHIR servers

use crate::config::QuerierConfig;
use crate::domain::{LanternError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::{Duration, Instant};

/// MIME type for FHIR 3.0 and later
pub const FHIR3_PLUS_JSON_MIME_TYPE: &str = "application/fhir+json";

/// MIME type for FHIR 2 (DSTU2) and earlier
pub const FHIR2_LESS_JSON_MIME_TYPE: &str = "application/json+fhir";

pub const TLS_VERSION_UNKNOWN: &str = "TLS version unknown";
pub const NO_TLS: &str = "No TLS";

/// Outcome of one GET against a FHIR server
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: String,

    /// Response body, read only for a 200 with a JSON content type
    pub body: Option<Vec<u8>>,

    pub tls_version: String,

    /// Seconds from sending the request to receiving the headers
    pub response_time: f64,
}

impl FetchResponse {
    /// True when the requested MIME type produced a usable JSON response
    pub fn mime_worked(&self) -> bool {
        self.status == StatusCode::OK.as_u16() && is_json_mime_type(&self.content_type)
    }
}

/// GETs a URL with a given Accept header
///
/// Callers bound the request with their job deadline.
#[async_trait]
pub trait CapabilityFetcher: Send + Sync {
    async fn fetch(&self, url: &str, accept: &str) -> Result<FetchResponse>;
}

pub fn is_json_mime_type(mime_type: &str) -> bool {
    mime_type.contains("json")
}

/// TLS label for a URL
///
/// reqwest does not expose the negotiated protocol version, so HTTPS reports
/// it as unknown.
pub fn tls_version_for(url: &reqwest::Url) -> &'static str {
    if url.scheme() == "https" {
        TLS_VERSION_UNKNOWN
    } else {
        NO_TLS
    }
}

/// [`CapabilityFetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the client from the `[querier]` section
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &QuerierConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LanternError::Fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CapabilityFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, accept: &str) -> Result<FetchResponse> {
        let start = Instant::now();
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| LanternError::Fetch(format!("making the GET request to {url} failed: {e}")))?;
        let response_time = start.elapsed().as_secs_f64();

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let tls_version = tls_version_for(resp.url()).to_string();

        let body = if status == StatusCode::OK.as_u16() && is_json_mime_type(&content_type) {
            let bytes = resp.bytes().await.map_err(|e| {
                LanternError::Fetch(format!("reading the response from {url} failed: {e}"))
            })?;
            Some(bytes.to_vec())
        } else {
            None
        };

        tracing::debug!(url = %url, status, accept = %accept, "Fetched");

        Ok(FetchResponse {
            status,
            content_type,
            body,
            tls_version,
            response_time,
        })
    }
}
