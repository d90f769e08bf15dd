//! Vendor and certified product matching
//!
//! Resolves the developer and certified health IT product behind a
//! capability statement.

use crate::adapters::database::EndpointStore;
use crate::domain::{LanternError, ProductId, Result, VendorId};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Resolves vendor and product identifiers for a capability statement
#[async_trait]
pub trait EndpointMatcher: Send + Sync {
    async fn match_vendor(
        &self,
        capability_statement: Option<&Value>,
        store: &dyn EndpointStore,
    ) -> Result<Option<VendorId>>;

    async fn match_product(
        &self,
        capability_statement: Option<&Value>,
        store: &dyn EndpointStore,
        mapping_file: Option<&Path>,
    ) -> Result<Option<ProductId>>;
}

/// One entry of the product mapping file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductMapping {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "productId")]
    pub product_id: i64,
}

/// Exact-name matcher
///
/// The vendor is the statement's `publisher`, compared against the vendor
/// table ignoring case. The product is the `software.name` and
/// `software.version` pair looked up in the mapping file.
#[derive(Debug, Clone, Default)]
pub struct PublisherMatcher;

impl PublisherMatcher {
    pub fn new() -> Self {
        Self
    }
}

fn string_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Reads and parses a product mapping file
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON list of
/// `{name, version, productId}` objects.
pub async fn load_product_mappings(path: &Path) -> Result<Vec<ProductMapping>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        LanternError::Io(format!("unable to read product mapping file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        LanternError::Serialization(format!(
            "product mapping file {} is malformed: {e}",
            path.display()
        ))
    })
}

#[async_trait]
impl EndpointMatcher for PublisherMatcher {
    async fn match_vendor(
        &self,
        capability_statement: Option<&Value>,
        store: &dyn EndpointStore,
    ) -> Result<Option<VendorId>> {
        let Some(publisher) = capability_statement.and_then(|cs| string_at(cs, &["publisher"]))
        else {
            return Ok(None);
        };
        store.find_vendor_by_name(publisher).await
    }

    async fn match_product(
        &self,
        capability_statement: Option<&Value>,
        _store: &dyn EndpointStore,
        mapping_file: Option<&Path>,
    ) -> Result<Option<ProductId>> {
        let (Some(cs), Some(path)) = (capability_statement, mapping_file) else {
            return Ok(None);
        };
        let Some(name) = string_at(cs, &["software", "name"]) else {
            return Ok(None);
        };
        let version = string_at(cs, &["software", "version"]).unwrap_or_default();

        let mappings = load_product_mappings(path).await?;
        Ok(mappings
            .iter()
            .find(|m| m.name.trim().eq_ignore_ascii_case(name) && m.version.trim() == version)
            .map(|m| ProductId::new(m.product_id)))
    }
}
