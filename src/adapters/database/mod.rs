//! Endpoint store abstraction layer
//!
//! This module provides the trait-based store used by ingestion and the
//! querier, allowing Lantern to run against PostgreSQL or fully in memory.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_endpoint_store;
pub use memory::InMemoryEndpointStore;
pub use traits::EndpointStore;
