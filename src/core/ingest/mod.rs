//! Ingestion of querier results
//!
//! [`CapabilityIngestHandler`] applies capability-statement messages with the
//! insert / full-update / telemetry-refresh upsert and records history.
//! [`VersionsIngestHandler`] applies `$versions` responses, prunes rows for
//! versions an endpoint stopped advertising and requests fresh capability
//! queries for the rest.

pub mod capability;
pub mod checks;
pub mod parse;
pub mod versions;

pub use capability::{CapabilityIngestHandler, IngestOutcome};
pub use checks::{included_fields, operation_resource, run_validation};
pub use parse::{parse_capability_message, ParsedCapability};
pub use versions::{parse_versions_message, VersionsIngestHandler};
