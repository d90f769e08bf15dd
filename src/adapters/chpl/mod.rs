//! Certified health IT (CHPL) matching
//!
//! Links an endpoint to the vendor and certified product that serve it.

pub mod matcher;

pub use matcher::{load_product_mappings, EndpointMatcher, ProductMapping, PublisherMatcher};
