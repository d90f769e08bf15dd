// Lantern - FHIR Endpoint Capability Collection Pipeline
// Copyright (c) 2025 Lantern Contributors
// Licensed under the MIT License

//! # Lantern - FHIR endpoint capability collection
//!
//! Lantern periodically queries a list of FHIR endpoints for their capability
//! statements, SMART configuration and supported FHIR versions, and stores the
//! results with full change history.
//!
//! ## Overview
//!
//! The pipeline is three services talking over a message broker:
//! - **Sender** publishes the endpoint list for `$versions` requests
//! - **Querier** runs a bounded pool of deadline-limited query jobs
//! - **Receiver** stores results, expanding each endpoint into one row per
//!   advertised FHIR version
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline stages (dispatcher, querier, sender, consumer, ingest)
//! - [`adapters`] - External integrations (RabbitMQ, FHIR servers, PostgreSQL)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lantern::adapters::broker::{InMemoryBroker, MessageBroker, QueueTarget};
//! use lantern::core::dispatcher::JobDispatcher;
//! use lantern::core::metrics::PipelineMetrics;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = InMemoryBroker::new();
//!     let channel = broker.create_channel().await?;
//!     broker.declare_queue(channel, "capability-statements").await?;
//!
//!     let metrics = Arc::new(PipelineMetrics::new());
//!     let dispatcher = JobDispatcher::new(metrics.clone());
//!     let shutdown = CancellationToken::new();
//!     dispatcher.start(shutdown.clone(), 10).await?;
//!
//!     // ... submit query jobs ...
//!
//!     dispatcher.stop().await?;
//!     metrics.snapshot().log("example");
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`], whose error is
//! [`domain::LanternError`]:
//!
//! ```rust,no_run
//! use lantern::domain::LanternError;
//!
//! fn example() -> Result<(), LanternError> {
//!     let config = lantern::config::load_config("lantern.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
