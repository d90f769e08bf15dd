//! Capability querier
//!
//! Turns endpoint requests into jobs on the [`JobDispatcher`](crate::core::dispatcher::JobDispatcher).
//! [`CapabilityQuery`] and [`VersionsQuery`] are the units of work; the
//! request handlers and [`Producer`] feed them from queues or from a list.

pub mod capability;
pub mod handlers;
pub mod producer;
pub mod versions;

pub use capability::{CapabilityQuery, QueryServices, PUBLISH_RESERVE};
pub use handlers::{
    parse_capability_request, CapabilityRequestHandler, JobSettings, VersionsRequestHandler,
};
pub use producer::Producer;
pub use versions::{parse_versions_body, VersionsQuery};
