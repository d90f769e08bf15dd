//! Pipeline metrics registry
//!
//! One [`PipelineMetrics`] is built per process and shared by `Arc` with the
//! dispatcher, the consumer loops and the handlers. Counters are monotonic.
//!
//! Every increment is also reported through the `metrics` facade so an
//! installed recorder can export it. Without a recorder those calls are
//! no-ops and the snapshot is the only view.

use ::metrics::{counter, describe_counter};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

const JOBS_TOTAL: &str = "lantern_jobs_total";
const MESSAGES_TOTAL: &str = "lantern_messages_total";
const SETTLEMENTS_TOTAL: &str = "lantern_settlements_total";
const ENDPOINT_INFOS_TOTAL: &str = "lantern_endpoint_infos_total";

/// Registers metric descriptions with the installed recorder
pub fn register_metrics() {
    describe_counter!(JOBS_TOTAL, "Query jobs by outcome");
    describe_counter!(MESSAGES_TOTAL, "Consumed messages by handler outcome");
    describe_counter!(SETTLEMENTS_TOTAL, "Broker acks and nacks");
    describe_counter!(ENDPOINT_INFOS_TOTAL, "Endpoint info rows by change kind");
}

/// Counters for the query, consume and ingest stages
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    jobs_submitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_timed_out: AtomicU64,
    messages_processed: AtomicU64,
    handler_errors: AtomicU64,
    acks: AtomicU64,
    nacks: AtomicU64,
    requeues: AtomicU64,
    infos_inserted: AtomicU64,
    infos_updated: AtomicU64,
    infos_refreshed: AtomicU64,
    infos_pruned: AtomicU64,
}

impl PipelineMetrics {
    /// Creates a registry with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        counter!(JOBS_TOTAL, "outcome" => "submitted").increment(1);
    }

    pub fn record_job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        counter!(JOBS_TOTAL, "outcome" => "completed").increment(1);
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        counter!(JOBS_TOTAL, "outcome" => "failed").increment(1);
    }

    pub fn record_job_timed_out(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
        counter!(JOBS_TOTAL, "outcome" => "timed_out").increment(1);
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        counter!(MESSAGES_TOTAL, "outcome" => "processed").increment(1);
    }

    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
        counter!(MESSAGES_TOTAL, "outcome" => "error").increment(1);
    }

    pub fn record_ack(&self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
        counter!(SETTLEMENTS_TOTAL, "kind" => "ack").increment(1);
    }

    /// Records a negative acknowledgement, and a requeue when `requeue` is set
    pub fn record_nack(&self, requeue: bool) {
        self.nacks.fetch_add(1, Ordering::Relaxed);
        if requeue {
            self.requeues.fetch_add(1, Ordering::Relaxed);
        }
        let kind = if requeue { "nack_requeue" } else { "nack" };
        counter!(SETTLEMENTS_TOTAL, "kind" => kind).increment(1);
    }

    pub fn record_info_inserted(&self) {
        self.infos_inserted.fetch_add(1, Ordering::Relaxed);
        counter!(ENDPOINT_INFOS_TOTAL, "change" => "inserted").increment(1);
    }

    pub fn record_info_updated(&self) {
        self.infos_updated.fetch_add(1, Ordering::Relaxed);
        counter!(ENDPOINT_INFOS_TOTAL, "change" => "updated").increment(1);
    }

    /// Telemetry-only refresh of an unchanged endpoint
    pub fn record_info_refreshed(&self) {
        self.infos_refreshed.fetch_add(1, Ordering::Relaxed);
        counter!(ENDPOINT_INFOS_TOTAL, "change" => "refreshed").increment(1);
    }

    pub fn record_info_pruned(&self) {
        self.infos_pruned.fetch_add(1, Ordering::Relaxed);
        counter!(ENDPOINT_INFOS_TOTAL, "change" => "pruned").increment(1);
    }

    /// Copies the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
            nacks: self.nacks.load(Ordering::Relaxed),
            requeues: self.requeues.load(Ordering::Relaxed),
            infos_inserted: self.infos_inserted.load(Ordering::Relaxed),
            infos_updated: self.infos_updated.load(Ordering::Relaxed),
            infos_refreshed: self.infos_refreshed.load(Ordering::Relaxed),
            infos_pruned: self.infos_pruned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_timed_out: u64,
    pub messages_processed: u64,
    pub handler_errors: u64,
    pub acks: u64,
    pub nacks: u64,
    pub requeues: u64,
    pub infos_inserted: u64,
    pub infos_updated: u64,
    pub infos_refreshed: u64,
    pub infos_pruned: u64,
}

impl MetricsSnapshot {
    /// Logs the snapshot at INFO, used when a command shuts down
    pub fn log(&self, service: &str) {
        tracing::info!(
            service,
            jobs_submitted = self.jobs_submitted,
            jobs_completed = self.jobs_completed,
            jobs_failed = self.jobs_failed,
            jobs_timed_out = self.jobs_timed_out,
            messages_processed = self.messages_processed,
            handler_errors = self.handler_errors,
            acks = self.acks,
            nacks = self.nacks,
            requeues = self.requeues,
            infos_inserted = self.infos_inserted,
            infos_updated = self.infos_updated,
            infos_refreshed = self.infos_refreshed,
            infos_pruned = self.infos_pruned,
            "Pipeline metrics"
        );
    }
}
