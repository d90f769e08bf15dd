//! Capability statement query job
//!
//! Fetches `<url>/metadata` with MIME type negotiation and
//! `<url>/.well-known/smart-configuration`, then publishes the combined
//! result to the capability-statements queue. A failed fetch still publishes,
//! with `err` set.

use crate::adapters::broker::QueueTarget;
use crate::adapters::database::EndpointStore;
use crate::adapters::fhir::{
    metadata_url, well_known_url, CapabilityFetcher, FetchResponse, FHIR2_LESS_JSON_MIME_TYPE,
    FHIR3_PLUS_JSON_MIME_TYPE,
};
use crate::core::dispatcher::{JobContext, JobHandler};
use crate::domain::{CapabilityMessage, LanternError, RequestedVersion, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Part of the job budget kept back for publishing the result
pub const PUBLISH_RESERVE: Duration = Duration::from_secs(2);

/// Collaborators shared by every query job of one querier
#[derive(Clone)]
pub struct QueryServices {
    pub fetcher: Arc<dyn CapabilityFetcher>,
    pub store: Arc<dyn EndpointStore>,
    pub request_delay: Duration,
}

/// One capability statement query for one endpoint and FHIR version
pub struct CapabilityQuery {
    url: String,
    requested_version: RequestedVersion,
    default_version: String,
    services: QueryServices,
    target: QueueTarget,
}

impl CapabilityQuery {
    pub fn new(
        url: impl Into<String>,
        requested_version: RequestedVersion,
        default_version: impl Into<String>,
        services: QueryServices,
        target: QueueTarget,
    ) -> Self {
        Self {
            url: url.into(),
            requested_version,
            default_version: default_version.into(),
            services,
            target,
        }
    }

    /// Accept header value for `mime`, with the requested FHIR version as a parameter
    fn accept(&self, mime: &str) -> String {
        if self.requested_version.is_none() {
            mime.to_string()
        } else {
            format!("{mime}; fhirVersion={}", self.requested_version)
        }
    }

    async fn fetch(&self, ctx: &JobContext, url: &str, mime: &str) -> Result<FetchResponse> {
        ctx.run(self.services.fetcher.fetch(url, &self.accept(mime)))
            .await?
    }

    /// Queries the metadata URL and fills the metadata fields of `message`
    ///
    /// Stored MIME types are tried first. If the first attempt fails the other
    /// FHIR JSON type is tried; with nothing stored, both are tried so the
    /// result records every type the server accepts.
    async fn request_metadata(
        &self,
        ctx: &JobContext,
        url: &str,
        message: &mut CapabilityMessage,
    ) -> Result<()> {
        tokio::time::sleep(self.services.request_delay).await;

        let mut stored = message.mime_types.clone();
        let first_idx = if stored.len() == 2 {
            rand::thread_rng().gen_range(0..2)
        } else {
            0
        };
        let first_mime = stored
            .get(first_idx)
            .cloned()
            .unwrap_or_else(|| FHIR3_PLUS_JSON_MIME_TYPE.to_string());

        let first = self.fetch(ctx, url, &first_mime).await?;
        let first_worked = first.mime_worked();

        let mut other_mime = FHIR2_LESS_JSON_MIME_TYPE.to_string();
        let mut other_worked = false;
        let mut response = first;

        if !first_worked {
            match stored.len() {
                2 => {
                    other_mime = stored[(first_idx + 1) % 2].clone();
                    stored = vec![other_mime.clone()];
                }
                1 => {
                    if stored[0] == other_mime {
                        other_mime = FHIR3_PLUS_JSON_MIME_TYPE.to_string();
                    }
                    stored.clear();
                }
                _ => {}
            }
            response = self.fetch(ctx, url, &other_mime).await?;
            other_worked = response.mime_worked();
        } else if stored.is_empty() {
            other_worked = self.fetch(ctx, url, &other_mime).await?.mime_worked();
        }

        let mut negotiated = Vec::new();
        if stored.len() == 1 && (response.status != 200 || !other_worked) {
            stored.clear();
        } else if other_worked {
            negotiated.push(other_mime);
        }
        if first_worked && stored.is_empty() {
            negotiated.push(first_mime);
        }
        if stored.is_empty() {
            stored = negotiated;
        }

        message.mime_types = stored;
        message.tls_version = response.tls_version.clone();
        message.http_response = i32::from(response.status);
        message.response_time = response.response_time;
        message.capability_statement = parse_body(&response)?;
        Ok(())
    }

    /// Queries the SMART well-known URL and fills the SMART fields of `message`
    async fn request_well_known(
        &self,
        ctx: &JobContext,
        url: &str,
        message: &mut CapabilityMessage,
    ) -> Result<()> {
        tokio::time::sleep(self.services.request_delay).await;

        let mime = message
            .mime_types
            .first()
            .cloned()
            .unwrap_or_else(|| FHIR3_PLUS_JSON_MIME_TYPE.to_string());
        let response = self.fetch(ctx, url, &mime).await?;
        message.smart_http_response = i32::from(response.status);
        message.smart_response = parse_body(&response)?;
        Ok(())
    }

    /// Builds the message for this endpoint; fetch failures are recorded in `err`
    pub async fn build_message(&self, ctx: &JobContext) -> Result<CapabilityMessage> {
        let stored = match self.services.store.mime_types_for(&self.url).await {
            Ok(types) => types,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Could not read stored MIME types");
                Vec::new()
            }
        };

        let mut message = CapabilityMessage {
            url: self.url.clone(),
            mime_types: stored,
            requested_fhir_version: self.requested_version.as_str().to_string(),
            default_fhir_version: self.default_version.clone(),
            ..Default::default()
        };

        let metadata = metadata_url(&self.url);
        let fetch_ctx = ctx.with_reserve(PUBLISH_RESERVE);

        if let Err(e) = self.request_metadata(&fetch_ctx, &metadata, &mut message).await {
            message.err = match e {
                LanternError::Dispatcher(_) => {
                    format!("server could not be reached from URL: {metadata}")
                }
                other => other.to_string(),
            };
            tracing::warn!(url = %self.url, error = %message.err, "Capability statement request failed");
        }

        let well_known = well_known_url(&self.url);
        if let Err(e) = self
            .request_well_known(&fetch_ctx, &well_known, &mut message)
            .await
        {
            tracing::warn!(url = %well_known, error = %e, "SMART well-known request failed");
        }

        Ok(message)
    }
}

fn parse_body(response: &FetchResponse) -> Result<Option<Value>> {
    response
        .body
        .as_deref()
        .map(serde_json::from_slice)
        .transpose()
        .map_err(LanternError::from)
}

#[async_trait]
impl JobHandler for CapabilityQuery {
    fn target(&self) -> &str {
        &self.url
    }

    async fn handle(&self, ctx: &JobContext) -> Result<()> {
        let message = self.build_message(ctx).await?;
        let body = serde_json::to_vec(&message)?;

        // Runs in the reserve left after the fetch deadline; still bounded by
        // the job deadline and dropped with the job on shutdown
        self.target
            .send(&CancellationToken::new(), &body)
            .await
            .map_err(|e| {
                LanternError::Other(format!(
                    "error sending capability statement for FHIR endpoint {} to queue '{}': {e}",
                    self.url,
                    self.target.queue()
                ))
            })?;

        crate::log_pipeline_stage!("query", self.url, self.requested_version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::{InMemoryBroker, MessageBroker};
    use crate::adapters::database::InMemoryEndpointStore;
    use crate::domain::EndpointMetadata;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Answers by Accept header; records every request
    #[derive(Default)]
    struct ScriptedFetcher {
        working: HashMap<String, bool>,
        requests: Mutex<Vec<(String, String)>>,
        hang: bool,
    }

    impl ScriptedFetcher {
        fn accepting(mimes: &[&str]) -> Self {
            Self {
                working: mimes.iter().map(|m| (m.to_string(), true)).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CapabilityFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, accept: &str) -> Result<FetchResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), accept.to_string()));
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let mime = accept.split(';').next().unwrap_or_default();
            let works = self.working.get(mime).copied().unwrap_or(false);
            Ok(FetchResponse {
                status: if works { 200 } else { 406 },
                content_type: if works { mime.to_string() } else { "text/html".to_string() },
                body: works.then(|| br#"{"fhirVersion": "4.0.1"}"#.to_vec()),
                tls_version: "TLS version unknown".to_string(),
                response_time: 0.1,
            })
        }
    }

    async fn query(
        fetcher: Arc<ScriptedFetcher>,
        store: Arc<InMemoryEndpointStore>,
        version: &str,
    ) -> (CapabilityQuery, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        let ch = broker.create_channel().await.unwrap();
        broker.declare_queue(ch, "capability-statements").await.unwrap();
        let target = QueueTarget::new(Arc::new(broker.clone()), ch, "capability-statements");
        let services = QueryServices {
            fetcher,
            store,
            request_delay: Duration::ZERO,
        };
        let q = CapabilityQuery::new(
            "https://fhir.example.com",
            RequestedVersion::new(version),
            "4.0",
            services,
            target,
        );
        (q, broker)
    }

    fn ctx(secs: u64) -> JobContext {
        JobContext::new(CancellationToken::new(), Instant::now() + Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_tries_both_types_when_nothing_stored() {
        let fetcher = Arc::new(ScriptedFetcher::accepting(&[
            FHIR3_PLUS_JSON_MIME_TYPE,
            FHIR2_LESS_JSON_MIME_TYPE,
        ]));
        let (q, broker) = query(fetcher.clone(), Arc::new(InMemoryEndpointStore::new()), "").await;

        q.handle(&ctx(30)).await.unwrap();

        let published = broker.drain("capability-statements").await;
        let msg: CapabilityMessage = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(
            msg.mime_types,
            vec![FHIR2_LESS_JSON_MIME_TYPE.to_string(), FHIR3_PLUS_JSON_MIME_TYPE.to_string()]
        );
        assert_eq!(msg.http_response, 200);
        assert_eq!(msg.requested_fhir_version, "None");
        assert!(msg.capability_statement.is_some());
        assert!(msg.err.is_empty());

        let requests = fetcher.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].0, "https://fhir.example.com/metadata");
        assert_eq!(requests[2].0, "https://fhir.example.com/.well-known/smart-configuration");
    }

    #[tokio::test]
    async fn test_falls_back_to_other_type() {
        let fetcher = Arc::new(ScriptedFetcher::accepting(&[FHIR2_LESS_JSON_MIME_TYPE]));
        let (q, _broker) = query(fetcher, Arc::new(InMemoryEndpointStore::new()), "").await;

        let msg = q.build_message(&ctx(30)).await.unwrap();
        assert_eq!(msg.mime_types, vec![FHIR2_LESS_JSON_MIME_TYPE.to_string()]);
        assert_eq!(msg.http_response, 200);
    }

    #[tokio::test]
    async fn test_stored_type_that_stopped_working_is_dropped() {
        let store = Arc::new(InMemoryEndpointStore::new());
        let mid = store
            .insert_metadata(&EndpointMetadata::new("https://fhir.example.com", RequestedVersion::none()))
            .await
            .unwrap();
        let mut info = crate::domain::EndpointInfo::new("https://fhir.example.com", RequestedVersion::none());
        info.mime_types = vec![FHIR2_LESS_JSON_MIME_TYPE.to_string()];
        store.insert_info(&info, mid).await.unwrap();

        let fetcher = Arc::new(ScriptedFetcher::accepting(&[FHIR3_PLUS_JSON_MIME_TYPE]));
        let (q, _broker) = query(fetcher.clone(), store, "").await;

        let msg = q.build_message(&ctx(30)).await.unwrap();
        assert_eq!(msg.mime_types, vec![FHIR3_PLUS_JSON_MIME_TYPE.to_string()]);
        let requests = fetcher.requests.lock().unwrap().clone();
        assert_eq!(requests[0].1, FHIR2_LESS_JSON_MIME_TYPE);
        assert_eq!(requests[1].1, FHIR3_PLUS_JSON_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_requested_version_sets_accept_parameter() {
        let fetcher = Arc::new(ScriptedFetcher::accepting(&[FHIR3_PLUS_JSON_MIME_TYPE]));
        let (q, _broker) = query(fetcher.clone(), Arc::new(InMemoryEndpointStore::new()), "4.0").await;

        q.build_message(&ctx(30)).await.unwrap();
        let requests = fetcher.requests.lock().unwrap().clone();
        assert_eq!(requests[0].1, "application/fhir+json; fhirVersion=4.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_still_publishes_with_error() {
        let fetcher = Arc::new(ScriptedFetcher {
            hang: true,
            ..Default::default()
        });
        let (q, broker) = query(fetcher, Arc::new(InMemoryEndpointStore::new()), "").await;

        q.handle(&ctx(10)).await.unwrap();

        let published = broker.drain("capability-statements").await;
        let msg: CapabilityMessage = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(
            msg.err,
            "server could not be reached from URL: https://fhir.example.com/metadata"
        );
        assert_eq!(msg.http_response, 0);
        assert_eq!(msg.smart_http_response, 0);
    }
}
