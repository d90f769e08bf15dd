//! List-driven producer

use super::capability::CapabilityQuery;
use super::handlers::JobSettings;
use crate::adapters::broker::QueueTarget;
use crate::core::dispatcher::Job;
use crate::domain::{RequestedVersion, Result};
use std::sync::Arc;

/// Submits one capability job per endpoint in a list
pub struct Producer {
    settings: JobSettings,
    target: QueueTarget,
}

impl Producer {
    /// `target` is the capability-statements queue the jobs publish to
    pub fn new(settings: JobSettings, target: QueueTarget) -> Self {
        Self { settings, target }
    }

    /// Submits a job for every URL and returns how many were accepted
    ///
    /// A rejected job is logged and skipped. The loop ends early once the
    /// dispatcher reports cancellation.
    pub async fn run_list(&self, endpoints: &[String]) -> Result<usize> {
        let mut submitted = 0;
        for url in endpoints {
            let query = CapabilityQuery::new(
                url.clone(),
                RequestedVersion::none(),
                String::new(),
                self.settings.services.clone(),
                self.target.clone(),
            );
            let job = Job::new(
                self.settings.context.clone(),
                self.settings.duration,
                Arc::new(query),
            );
            match self.settings.dispatcher.add(job).await {
                Ok(()) => submitted += 1,
                Err(e) if e.is_cancelled() => {
                    tracing::info!(submitted, "Endpoint list interrupted by shutdown");
                    break;
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "Could not submit query job"),
            }
        }
        Ok(submitted)
    }
}
