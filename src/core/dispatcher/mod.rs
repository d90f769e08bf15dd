//! Bounded concurrent job dispatcher
//!
//! A [`JobDispatcher`] runs a fixed number of workers. Producers submit
//! [`Job`]s with [`JobDispatcher::add`], which blocks while every worker is
//! busy. Each job runs under its own deadline derived from its parent context.
//!
//! ```no_run
//! use lantern::core::dispatcher::JobDispatcher;
//! use lantern::core::metrics::PipelineMetrics;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lantern::domain::Result<()> {
//! let dispatcher = JobDispatcher::new(Arc::new(PipelineMetrics::new()));
//! dispatcher.start(CancellationToken::new(), 10).await?;
//! // dispatcher.add(job).await?;
//! dispatcher.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod job;
pub mod pool;

pub use job::{Job, JobContext, JobHandler};
pub use pool::JobDispatcher;
