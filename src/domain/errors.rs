//! Domain error types
//!
//! This module defines the error hierarchy for Lantern. Transport errors live in
//! [`BrokerError`], worker pool lifecycle errors in [`DispatcherError`], and everything
//! else is a variant of [`LanternError`]. None of them expose third-party types.

use thiserror::Error;

/// Main Lantern error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum LanternError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Message broker errors
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Worker pool errors
    #[error("Dispatcher error: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// A queue message could not be parsed into its typed record
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Vendor or product matching failed for an endpoint
    #[error("Match error for {url}: {message}")]
    Match { url: String, message: String },

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound HTTP errors against a FHIR server
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Message broker errors
///
/// Errors raised by a [`MessageBroker`](crate::adapters::broker::MessageBroker)
/// implementation. The AMQP client error is rendered into the message.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not reach or authenticate against the broker
    #[error("Failed to connect to broker: {0}")]
    Connection(String),

    /// Channel creation failed or the channel is not usable
    #[error("Channel error: {0}")]
    Channel(String),

    /// A message could not be published or was not confirmed
    #[error("Failed to publish message: {0}")]
    Publish(String),

    /// The named queue does not exist on the broker
    #[error("queue {0} does not exist")]
    QueueNotFound(String),

    /// Any other broker failure
    #[error("{0}")]
    Broker(String),
}

/// Worker pool lifecycle and job errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatcherError {
    /// `start` was called while a pool is running
    #[error("workers have already started")]
    AlreadyStarted,

    /// `stop` was called while no pool is running
    #[error("no workers are currently running")]
    NotRunning,

    /// The pool context was cancelled
    #[error("context canceled")]
    Cancelled,

    /// A job ran past its duration budget
    #[error("context deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl LanternError {
    /// Wraps a matcher failure with the endpoint URL it was working on
    pub fn matching(url: impl Into<String>, message: impl Into<String>) -> Self {
        LanternError::Match {
            url: url.into(),
            message: message.into(),
        }
    }

    /// True if this error is the benign shutdown signal from the dispatcher
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LanternError::Dispatcher(DispatcherError::Cancelled))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for LanternError {
    fn from(err: std::io::Error) -> Self {
        LanternError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for LanternError {
    fn from(err: serde_json::Error) -> Self {
        LanternError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for LanternError {
    fn from(err: toml::de::Error) -> Self {
        LanternError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lantern_error_display() {
        let err = LanternError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_broker_error_conversion() {
        let broker_err = BrokerError::Connection("connection refused".to_string());
        let err: LanternError = broker_err.into();
        assert!(matches!(err, LanternError::Broker(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_queue_not_found_message() {
        let err = BrokerError::QueueNotFound("capability-statements".to_string());
        assert_eq!(err.to_string(), "queue capability-statements does not exist");
    }

    #[test]
    fn test_dispatcher_error_messages() {
        assert_eq!(
            DispatcherError::AlreadyStarted.to_string(),
            "workers have already started"
        );
        assert_eq!(
            DispatcherError::NotRunning.to_string(),
            "no workers are currently running"
        );
    }

    #[test]
    fn test_is_cancelled() {
        let err: LanternError = DispatcherError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!LanternError::Other("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_match_error_includes_url() {
        let err = LanternError::matching("https://fhir.example.com", "vendor lookup failed");
        assert_eq!(
            err.to_string(),
            "Match error for https://fhir.example.com: vendor lookup failed"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: LanternError = io_err.into();
        assert!(matches!(err, LanternError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: LanternError = json_err.into();
        assert!(matches!(err, LanternError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: LanternError = toml_err.into();
        assert!(matches!(err, LanternError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_lantern_error_implements_std_error() {
        let err = LanternError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
