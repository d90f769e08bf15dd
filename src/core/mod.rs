//! Pipeline stages
//!
//! - [`dispatcher`] - Bounded worker pool running deadline-bound jobs
//! - [`querier`] - Capability and `$versions` query jobs and their producers
//! - [`sender`] - Periodic publisher of the endpoint list
//! - [`consumer`] - Queue-to-handler loops
//! - [`ingest`] - Persistence of query results
//! - [`metrics`] - Pipeline counters, mirrored to the `metrics` facade
//!
//! # Flow
//!
//! 1. **Send**: the sender publishes endpoint URLs to the versions-requests queue
//! 2. **Versions**: the querier runs a `$versions` job per URL
//! 3. **Expand**: the receiver stores the advertised versions and requests
//!    one capability query per version
//! 4. **Query**: the querier fetches `metadata` and the SMART configuration
//! 5. **Ingest**: the receiver inserts, refreshes or updates the endpoint rows
//!
//! # Example
//!
//! ```rust,no_run
//! use lantern::core::dispatcher::JobDispatcher;
//! use lantern::core::metrics::PipelineMetrics;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lantern::domain::Result<()> {
//! let dispatcher = JobDispatcher::new(Arc::new(PipelineMetrics::new()));
//! let ctx = CancellationToken::new();
//! dispatcher.start(ctx.clone(), 10).await?;
//! // ... add jobs ...
//! dispatcher.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod dispatcher;
pub mod ingest;
pub mod metrics;
pub mod querier;
pub mod sender;
