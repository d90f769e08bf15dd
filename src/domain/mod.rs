//! Domain models and types for Lantern.
//!
//! This module contains the core domain models and types shared by every
//! stage of the collection pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ChannelId`], [`MetadataId`], [`InfoId`], [`RequestedVersion`])
//! - **Endpoint state** ([`EndpointInfo`], [`EndpointMetadata`], [`HistoryEntry`])
//! - **Wire messages** ([`CapabilityMessage`], [`VersionsMessage`], [`CapabilityRequest`])
//! - **Error types** ([`LanternError`], [`BrokerError`], [`DispatcherError`])
//! - **Result type alias** ([`Result`])
//!
//! # Composite key
//!
//! Endpoint state is keyed by URL and requested FHIR version. An empty version
//! is always stored as the `"None"` sentinel:
//!
//! ```rust
//! use lantern::domain::{EndpointInfo, RequestedVersion};
//!
//! let info = EndpointInfo::new("https://fhir.example.com/r4", RequestedVersion::new(""));
//! assert_eq!(info.requested_fhir_version.as_str(), "None");
//! ```

pub mod endpoint;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod result;
pub mod versions;

// Re-export commonly used types for convenience
pub use endpoint::{
    EndpointInfo, EndpointMetadata, HistoryEntry, HistoryOperation, Validation, ValidationRule,
};
pub use errors::{BrokerError, DispatcherError, LanternError};
pub use ids::{ChannelId, InfoId, MetadataId, ProductId, RequestedVersion, VendorId};
pub use messages::{CapabilityMessage, CapabilityRequest, VersionsMessage, FINISHED_SENTINEL};
pub use result::Result;
pub use versions::VersionsResponse;
