//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Human-readable or JSON console output
//! - Configurable log levels
//! - Local JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use lantern::logging::init_logging;
//! use lantern::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", "endpointmanager", &config)
//!     .expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a failed query job
///
/// # Example
///
/// ```no_run
/// use lantern::log_job_failure;
/// use lantern::domain::LanternError;
///
/// let error = LanternError::Fetch("connection refused".to_string());
/// log_job_failure!("https://fhir.example.com/metadata", &error);
/// ```
#[macro_export]
macro_rules! log_job_failure {
    ($url:expr, $error:expr) => {
        tracing::warn!(
            url = %$url,
            error = %$error,
            "Query job failed"
        );
    };
}

/// Log an error returned by a message handler
///
/// # Example
///
/// ```no_run
/// use lantern::log_handler_error;
/// use lantern::domain::LanternError;
///
/// let error = LanternError::MalformedMessage("unable to cast message URL to string".to_string());
/// log_handler_error!("capability-statements", &error);
/// ```
#[macro_export]
macro_rules! log_handler_error {
    ($queue:expr, $error:expr) => {
        tracing::warn!(
            queue = %$queue,
            error = %$error,
            "Message handler failed"
        );
    };
}

/// Log a pipeline stage transition for one endpoint
///
/// # Example
///
/// ```no_run
/// use lantern::log_pipeline_stage;
///
/// log_pipeline_stage!("ingest", "https://fhir.example.com", "4.0");
/// ```
#[macro_export]
macro_rules! log_pipeline_stage {
    ($stage:expr, $url:expr, $version:expr) => {
        tracing::debug!(
            stage = $stage,
            url = %$url,
            requested_fhir_version = %$version,
            "Pipeline stage"
        );
    };
}
