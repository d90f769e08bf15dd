//! PostgreSQL database integration
//!
//! This module provides the PostgreSQL endpoint store, built on a
//! `deadpool-postgres` connection pool.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLEndpointStore;
pub use client::PostgreSQLClient;
pub use models::{PostgreSQLEndpointInfo, PostgreSQLMetadata};
