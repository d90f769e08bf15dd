//! PostgreSQL row models
//!
//! This module defines the row structures for the endpoint tables and their
//! conversion to and from the domain types. Map-valued fields are stored as
//! JSONB.

use crate::domain::{
    EndpointInfo, EndpointMetadata, InfoId, LanternError, MetadataId, ProductId,
    RequestedVersion, Result, Validation, VendorId,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::Row;

/// Row of `fhir_endpoints_metadata`
#[derive(Debug, Clone)]
pub struct PostgreSQLMetadata {
    pub id: Option<i64>,
    pub url: String,
    pub http_response: i32,
    pub errors: String,
    pub response_time_seconds: f64,
    pub smart_http_response: i32,
    pub requested_fhir_version: String,
    pub created_at: DateTime<Utc>,
}

impl PostgreSQLMetadata {
    pub fn from_domain(metadata: &EndpointMetadata) -> Self {
        Self {
            id: metadata.id.map(|id| id.value()),
            url: metadata.url.clone(),
            http_response: metadata.http_response,
            errors: metadata.errors.clone(),
            response_time_seconds: metadata.response_time_seconds,
            smart_http_response: metadata.smart_http_response,
            requested_fhir_version: metadata.requested_fhir_version.as_str().to_string(),
            created_at: metadata.created_at,
        }
    }

    /// Reads the `m_`-prefixed metadata columns of a joined row
    pub fn from_joined_row(row: &Row) -> Self {
        Self {
            id: row.get("m_id"),
            url: row.get("m_url"),
            http_response: row.get("m_http_response"),
            errors: row.get("m_errors"),
            response_time_seconds: row.get("m_response_time_seconds"),
            smart_http_response: row.get("m_smart_http_response"),
            requested_fhir_version: row.get("m_requested_fhir_version"),
            created_at: row.get("m_created_at"),
        }
    }

    pub fn to_domain(&self) -> EndpointMetadata {
        EndpointMetadata {
            id: self.id.map(MetadataId::new),
            url: self.url.clone(),
            http_response: self.http_response,
            errors: self.errors.clone(),
            response_time_seconds: self.response_time_seconds,
            smart_http_response: self.smart_http_response,
            requested_fhir_version: RequestedVersion::new(self.requested_fhir_version.clone()),
            created_at: self.created_at,
        }
    }
}

/// Row of `fhir_endpoints_info`, also the column set of its history table
#[derive(Debug, Clone)]
pub struct PostgreSQLEndpointInfo {
    pub id: Option<i64>,
    pub url: String,
    pub requested_fhir_version: String,
    pub tls_version: String,
    pub mime_types: Vec<String>,
    pub capability_statement: Option<Value>,
    pub capability_statement_bytes: Option<Vec<u8>>,
    pub validation: Value,
    pub smart_response: Option<Value>,
    pub smart_response_bytes: Option<Vec<u8>>,
    pub included_fields: Value,
    pub operation_resource: Value,
    pub vendor_id: Option<i64>,
    pub healthit_product_id: Option<i64>,
    pub capability_fhir_version: String,
    pub metadata_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostgreSQLEndpointInfo {
    /// Convert from the domain info
    ///
    /// # Errors
    ///
    /// Returns `LanternError::Serialization` if a map field cannot be encoded.
    pub fn from_domain(info: &EndpointInfo) -> Result<Self> {
        Ok(Self {
            id: info.id.map(|id| id.value()),
            url: info.url.clone(),
            requested_fhir_version: info.requested_fhir_version.as_str().to_string(),
            tls_version: info.tls_version.clone(),
            mime_types: info.mime_types.clone(),
            capability_statement: info.capability_statement.clone(),
            capability_statement_bytes: info.capability_statement_bytes.clone(),
            validation: serde_json::to_value(&info.validation)?,
            smart_response: info.smart_response.clone(),
            smart_response_bytes: info.smart_response_bytes.clone(),
            included_fields: serde_json::to_value(&info.included_fields)?,
            operation_resource: serde_json::to_value(&info.operation_resource)?,
            vendor_id: info.vendor_id.map(|id| id.value()),
            healthit_product_id: info.healthit_product_id.map(|id| id.value()),
            capability_fhir_version: info.capability_fhir_version.clone(),
            metadata_id: info.metadata_id.map(|id| id.value()),
            created_at: info.created_at,
            updated_at: info.updated_at,
        })
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            url: row.get("url"),
            requested_fhir_version: row.get("requested_fhir_version"),
            tls_version: row.get("tls_version"),
            mime_types: row.get("mime_types"),
            capability_statement: row.get("capability_statement"),
            capability_statement_bytes: row.get("capability_statement_bytes"),
            validation: row.get("validation"),
            smart_response: row.get("smart_response"),
            smart_response_bytes: row.get("smart_response_bytes"),
            included_fields: row.get("included_fields"),
            operation_resource: row.get("operation_resource"),
            vendor_id: row.get("vendor_id"),
            healthit_product_id: row.get("healthit_product_id"),
            capability_fhir_version: row.get("capability_fhir_version"),
            metadata_id: row.get("metadata_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Convert to the domain info, with an empty observation attached
    ///
    /// # Errors
    ///
    /// Returns `LanternError::Serialization` if a JSONB column holds an
    /// unexpected shape.
    pub fn to_domain(&self) -> Result<EndpointInfo> {
        let requested = RequestedVersion::new(self.requested_fhir_version.clone());
        let mut info = EndpointInfo::new(self.url.clone(), requested);
        info.id = self.id.map(InfoId::new);
        info.tls_version = self.tls_version.clone();
        info.mime_types = self.mime_types.clone();
        info.capability_statement = self.capability_statement.clone();
        info.capability_statement_bytes = self.capability_statement_bytes.clone();
        info.validation = decode::<Validation>("validation", &self.validation)?;
        info.smart_response = self.smart_response.clone();
        info.smart_response_bytes = self.smart_response_bytes.clone();
        info.included_fields = decode("included_fields", &self.included_fields)?;
        info.operation_resource = decode("operation_resource", &self.operation_resource)?;
        info.vendor_id = self.vendor_id.map(VendorId::new);
        info.healthit_product_id = self.healthit_product_id.map(ProductId::new);
        info.capability_fhir_version = self.capability_fhir_version.clone();
        info.metadata_id = self.metadata_id.map(MetadataId::new);
        info.created_at = self.created_at;
        info.updated_at = self.updated_at;
        Ok(info)
    }
}

fn decode<T: serde::de::DeserializeOwned + Default>(column: &str, value: &Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| LanternError::Serialization(format!("column {column}: {e}")))
}
