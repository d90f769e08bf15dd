//! Domain identifier types
//!
//! Newtype wrappers for the handles and row identifiers that flow through the
//! pipeline. Each type keeps IDs from different tables from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handle for a multiplexed session over one broker connection
///
/// A `ChannelId` is only meaningful for the broker that created it.
///
/// # Examples
///
/// ```
/// use lantern::domain::ids::ChannelId;
///
/// let channel = ChannelId::new(0);
/// assert_eq!(channel.index(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Creates a channel handle for the given slot
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the slot this handle refers to
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database identifier
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database identifier
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Identifier of an `fhir_endpoints_metadata` row
    MetadataId
);
row_id!(
    /// Identifier of an `fhir_endpoints_info` row
    InfoId
);
row_id!(
    /// Identifier of a vendor (health IT developer)
    VendorId
);
row_id!(
    /// Identifier of a certified health IT product
    ProductId
);

/// FHIR version that was requested from an endpoint
///
/// Half of the composite key of an endpoint info row. An empty version is
/// normalised to the sentinel `"None"` so the key is always well formed.
///
/// # Examples
///
/// ```
/// use lantern::domain::ids::RequestedVersion;
///
/// assert_eq!(RequestedVersion::new("").as_str(), "None");
/// assert_eq!(RequestedVersion::new("4.0.1").as_str(), "4.0.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestedVersion(String);

impl RequestedVersion {
    /// Sentinel used when no specific FHIR version was requested
    pub const NONE: &'static str = "None";

    /// Creates a requested version, mapping empty input to `"None"`
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        if version.trim().is_empty() {
            Self(Self::NONE.to_string())
        } else {
            Self(version)
        }
    }

    /// The `"None"` sentinel
    pub fn none() -> Self {
        Self(Self::NONE.to_string())
    }

    /// True for the `"None"` sentinel
    pub fn is_none(&self) -> bool {
        self.0 == Self::NONE
    }

    /// Returns the version as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for RequestedVersion {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for RequestedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestedVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl AsRef<str> for RequestedVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId::new(3).to_string(), "channel-3");
    }

    #[test]
    fn test_row_ids_are_distinct_types() {
        let metadata = MetadataId::new(7);
        let info = InfoId::from(7);
        assert_eq!(metadata.value(), info.value());
        assert_eq!(metadata.to_string(), "7");
    }

    #[test]
    fn test_requested_version_defaults_to_none() {
        assert!(RequestedVersion::new("").is_none());
        assert!(RequestedVersion::new("   ").is_none());
        assert!(RequestedVersion::default().is_none());
        assert!(!RequestedVersion::new("3.0.2").is_none());
    }

    #[test]
    fn test_requested_version_serde_is_transparent() {
        let version = RequestedVersion::new("4.0.1");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"4.0.1\"");
    }
}
