//! `$versions` operation query job

use super::capability::{QueryServices, PUBLISH_RESERVE};
use crate::adapters::broker::QueueTarget;
use crate::adapters::fhir::versions_url;
use crate::core::dispatcher::{JobContext, JobHandler};
use crate::domain::{LanternError, Result, VersionsMessage, VersionsResponse};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const VERSIONS_ACCEPT: &str = "application/json";

/// Reads a `$versions` body
///
/// Accepts the plain `{"versions": [...], "default": "..."}` shape and the
/// FHIR `Parameters` shape with `version` and `default` parameters.
pub fn parse_versions_body(body: &Value) -> VersionsResponse {
    if body.get("resourceType").and_then(Value::as_str) == Some("Parameters") {
        let mut response = VersionsResponse::default();
        let params = body.get("parameter").and_then(Value::as_array);
        for param in params.into_iter().flatten() {
            let code = param
                .get("valueCode")
                .or_else(|| param.get("valueString"))
                .and_then(Value::as_str);
            match (param.get("name").and_then(Value::as_str), code) {
                (Some("version"), Some(v)) => response.versions.push(v.to_string()),
                (Some("default"), Some(v)) => response.default = v.to_string(),
                _ => {}
            }
        }
        return response;
    }
    serde_json::from_value(body.clone()).unwrap_or_default()
}

/// One `$versions` query for one endpoint
pub struct VersionsQuery {
    url: String,
    services: QueryServices,
    target: QueueTarget,
}

impl VersionsQuery {
    pub fn new(url: impl Into<String>, services: QueryServices, target: QueueTarget) -> Self {
        Self {
            url: url.into(),
            services,
            target,
        }
    }

    async fn request(&self, ctx: &JobContext) -> Result<VersionsResponse> {
        tokio::time::sleep(self.services.request_delay).await;

        let url = versions_url(&self.url);
        let response = ctx
            .run(self.services.fetcher.fetch(&url, VERSIONS_ACCEPT))
            .await??;
        if response.status != 200 {
            return Ok(VersionsResponse::default());
        }
        match response.body.as_deref() {
            Some(body) if !body.is_empty() => {
                let value: Value = serde_json::from_slice(body)?;
                Ok(parse_versions_body(&value))
            }
            _ => Ok(VersionsResponse::default()),
        }
    }

    /// Builds the message for this endpoint; failures are recorded in `err`
    pub async fn build_message(&self, ctx: &JobContext) -> VersionsMessage {
        let fetch_ctx = ctx.with_reserve(PUBLISH_RESERVE);
        match self.request(&fetch_ctx).await {
            Ok(versions_response) => VersionsMessage {
                url: self.url.clone(),
                err: String::new(),
                versions_response,
            },
            Err(e) => {
                let err = match e {
                    LanternError::Dispatcher(_) => format!(
                        "server could not be reached from URL: {}",
                        versions_url(&self.url)
                    ),
                    other => other.to_string(),
                };
                tracing::warn!(url = %self.url, error = %err, "$versions request failed");
                VersionsMessage {
                    url: self.url.clone(),
                    err,
                    versions_response: VersionsResponse::default(),
                }
            }
        }
    }
}

#[async_trait]
impl JobHandler for VersionsQuery {
    fn target(&self) -> &str {
        &self.url
    }

    async fn handle(&self, ctx: &JobContext) -> Result<()> {
        let message = self.build_message(ctx).await;
        let body = serde_json::to_vec(&message)?;
        self.target
            .send(&CancellationToken::new(), &body)
            .await
            .map_err(|e| {
                LanternError::Other(format!(
                    "error sending versions response for FHIR endpoint {} to queue '{}': {e}",
                    self.url,
                    self.target.queue()
                ))
            })?;
        crate::log_pipeline_stage!("versions", self.url, "None");
        Ok(())
    }
}
