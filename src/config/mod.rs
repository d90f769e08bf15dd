//! Configuration management for Lantern.
//!
//! One TOML file configures all three services (querier, receiver and
//! sender); each reads the sections it needs.
//!
//! # Overview
//!
//! Lantern uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `LANTERN_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lantern::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("lantern.toml")?;
//!
//! println!("Broker: {}:{}", config.broker.host, config.broker.port);
//! println!("Workers: {}", config.querier.num_workers);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`BrokerConfig`] - Broker host, credentials and prefetch
//! - [`QueueConfig`] - Names of the four pipeline queues
//! - [`QuerierConfig`] - Worker count, job budget and HTTP client settings
//! - [`ReceiverConfig`] - Acknowledgement policy and product mapping
//! - [`SenderConfig`] - Endpoint list and send interval
//! - [`PostgreSQLConfig`] - Endpoint store connection
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [broker]
//! host = "rabbitmq"
//! username = "capabilityquerier"
//! password = "${LANTERN_QUEUE_PASSWORD}"
//!
//! [querier]
//! num_workers = 10
//!
//! [postgresql]
//! connection_string = "${LANTERN_DATABASE_URL}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    AckPolicy, ApplicationConfig, BrokerConfig, DatabaseTarget, LanternConfig, LoggingConfig,
    PostgreSQLConfig, QuerierConfig, QueueConfig, ReceiverConfig, SenderConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
