//! PostgreSQL endpoint store
//!
//! Implements [`EndpointStore`] over the tables created by
//! `migrations/001_initial_schema.sql`.

use super::client::PostgreSQLClient;
use super::models::{PostgreSQLEndpointInfo, PostgreSQLMetadata};
use crate::adapters::database::traits::EndpointStore;
use crate::domain::{
    EndpointInfo, EndpointMetadata, HistoryOperation, InfoId, LanternError, MetadataId,
    RequestedVersion, Result, VendorId, VersionsResponse,
};
use async_trait::async_trait;
use std::sync::Arc;

const INFO_COLUMNS: &str = "url, requested_fhir_version, tls_version, mime_types, \
    capability_statement, capability_statement_bytes, validation, smart_response, \
    smart_response_bytes, included_fields, operation_resource, vendor_id, \
    healthit_product_id, capability_fhir_version, metadata_id";

/// PostgreSQL-backed [`EndpointStore`]
pub struct PostgreSQLEndpointStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLEndpointStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl EndpointStore for PostgreSQLEndpointStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn get_current_info(
        &self,
        url: &str,
        version: &RequestedVersion,
    ) -> Result<Option<EndpointInfo>> {
        let query = r#"
            SELECT i.*,
                   m.id AS m_id, m.url AS m_url, m.http_response AS m_http_response,
                   m.errors AS m_errors, m.response_time_seconds AS m_response_time_seconds,
                   m.smart_http_response AS m_smart_http_response,
                   m.requested_fhir_version AS m_requested_fhir_version,
                   m.created_at AS m_created_at
            FROM fhir_endpoints_info i
            JOIN fhir_endpoints_metadata m ON m.id = i.metadata_id
            WHERE i.url = $1 AND i.requested_fhir_version = $2
        "#;

        let Some(row) = self
            .client
            .query_opt(query, &[&url, &version.as_str()])
            .await?
        else {
            tracing::debug!(url = %url, version = %version, "No stored endpoint info");
            return Ok(None);
        };

        let mut info = PostgreSQLEndpointInfo::from_row(&row).to_domain()?;
        info.metadata = PostgreSQLMetadata::from_joined_row(&row).to_domain();
        Ok(Some(info))
    }

    async fn insert_metadata(&self, metadata: &EndpointMetadata) -> Result<MetadataId> {
        let m = PostgreSQLMetadata::from_domain(metadata);
        let row = self
            .client
            .query_one(
                r#"
                INSERT INTO fhir_endpoints_metadata (
                    url, http_response, errors, response_time_seconds,
                    smart_http_response, requested_fhir_version, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
                &[
                    &m.url,
                    &m.http_response,
                    &m.errors,
                    &m.response_time_seconds,
                    &m.smart_http_response,
                    &m.requested_fhir_version,
                    &m.created_at,
                ],
            )
            .await?;
        Ok(MetadataId::new(row.get(0)))
    }

    async fn insert_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<InfoId> {
        let p = PostgreSQLEndpointInfo::from_domain(info)?;
        let mid = metadata_id.value();
        let query = format!(
            "INSERT INTO fhir_endpoints_info ({INFO_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING id"
        );
        let row = self
            .client
            .query_one(
                &query,
                &[
                    &p.url,
                    &p.requested_fhir_version,
                    &p.tls_version,
                    &p.mime_types,
                    &p.capability_statement,
                    &p.capability_statement_bytes,
                    &p.validation,
                    &p.smart_response,
                    &p.smart_response_bytes,
                    &p.included_fields,
                    &p.operation_resource,
                    &p.vendor_id,
                    &p.healthit_product_id,
                    &p.capability_fhir_version,
                    &mid,
                ],
            )
            .await?;
        Ok(InfoId::new(row.get(0)))
    }

    async fn update_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<()> {
        let p = PostgreSQLEndpointInfo::from_domain(info)?;
        let mid = metadata_id.value();
        let updated = self
            .client
            .execute(
                r#"
                UPDATE fhir_endpoints_info SET
                    tls_version = $3, mime_types = $4, capability_statement = $5,
                    capability_statement_bytes = $6, validation = $7, smart_response = $8,
                    smart_response_bytes = $9, included_fields = $10, operation_resource = $11,
                    vendor_id = $12, healthit_product_id = $13, capability_fhir_version = $14,
                    metadata_id = $15, updated_at = NOW()
                WHERE url = $1 AND requested_fhir_version = $2
                "#,
                &[
                    &p.url,
                    &p.requested_fhir_version,
                    &p.tls_version,
                    &p.mime_types,
                    &p.capability_statement,
                    &p.capability_statement_bytes,
                    &p.validation,
                    &p.smart_response,
                    &p.smart_response_bytes,
                    &p.included_fields,
                    &p.operation_resource,
                    &p.vendor_id,
                    &p.healthit_product_id,
                    &p.capability_fhir_version,
                    &mid,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(LanternError::Storage(format!(
                "no endpoint info for {} at version {}",
                info.url, info.requested_fhir_version
            )));
        }
        Ok(())
    }

    async fn relink_metadata(&self, info_id: InfoId, metadata_id: MetadataId) -> Result<()> {
        let updated = self
            .client
            .execute(
                "UPDATE fhir_endpoints_info SET metadata_id = $2, updated_at = NOW() WHERE id = $1",
                &[&info_id.value(), &metadata_id.value()],
            )
            .await?;
        if updated == 0 {
            return Err(LanternError::Storage(format!(
                "no endpoint info with id {info_id}"
            )));
        }
        Ok(())
    }

    async fn delete_info(&self, info: &EndpointInfo) -> Result<()> {
        self.client
            .execute(
                "DELETE FROM fhir_endpoints_info WHERE url = $1 AND requested_fhir_version = $2",
                &[&info.url, &info.requested_fhir_version.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn append_history(
        &self,
        info: &EndpointInfo,
        metadata_id: MetadataId,
        operation: HistoryOperation,
    ) -> Result<()> {
        let p = PostgreSQLEndpointInfo::from_domain(info)?;
        let mid = metadata_id.value();
        self.client
            .execute(
                r#"
                INSERT INTO fhir_endpoints_info_history (
                    operation, info_id, url, requested_fhir_version, tls_version, mime_types,
                    capability_statement, validation, smart_response, included_fields,
                    operation_resource, vendor_id, healthit_product_id,
                    capability_fhir_version, metadata_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
                &[
                    &operation.code(),
                    &p.id,
                    &p.url,
                    &p.requested_fhir_version,
                    &p.tls_version,
                    &p.mime_types,
                    &p.capability_statement,
                    &p.validation,
                    &p.smart_response,
                    &p.included_fields,
                    &p.operation_resource,
                    &p.vendor_id,
                    &p.healthit_product_id,
                    &p.capability_fhir_version,
                    &mid,
                ],
            )
            .await?;

        tracing::debug!(
            url = %info.url,
            version = %info.requested_fhir_version,
            operation = operation.code(),
            "History row appended"
        );
        Ok(())
    }

    async fn infos_with_other_versions(
        &self,
        url: &str,
        keep: &[RequestedVersion],
    ) -> Result<Vec<EndpointInfo>> {
        let keep: Vec<&str> = keep.iter().map(RequestedVersion::as_str).collect();
        let rows = self
            .client
            .query(
                "SELECT * FROM fhir_endpoints_info \
                 WHERE url = $1 AND NOT (requested_fhir_version = ANY($2))",
                &[&url, &keep],
            )
            .await?;

        rows.iter()
            .map(|row| PostgreSQLEndpointInfo::from_row(row).to_domain())
            .collect()
    }

    async fn get_versions_response(&self, url: &str) -> Result<Option<VersionsResponse>> {
        let row = self
            .client
            .query_opt(
                "SELECT versions_response FROM fhir_endpoints_versions WHERE url = $1",
                &[&url],
            )
            .await?;

        row.map(|row| {
            let value: serde_json::Value = row.get(0);
            serde_json::from_value(value).map_err(LanternError::from)
        })
        .transpose()
    }

    async fn save_versions_response(&self, url: &str, response: &VersionsResponse) -> Result<()> {
        let value = serde_json::to_value(response)?;
        self.client
            .execute(
                r#"
                INSERT INTO fhir_endpoints_versions (url, versions_response, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (url) DO UPDATE SET
                    versions_response = EXCLUDED.versions_response,
                    updated_at = EXCLUDED.updated_at
                "#,
                &[&url, &value],
            )
            .await?;
        Ok(())
    }

    async fn find_vendor_by_name(&self, name: &str) -> Result<Option<VendorId>> {
        let row = self
            .client
            .query_opt(
                "SELECT id FROM vendors WHERE LOWER(TRIM(name)) = LOWER(TRIM($1)) LIMIT 1",
                &[&name],
            )
            .await?;
        Ok(row.map(|row| VendorId::new(row.get(0))))
    }

    async fn mime_types_for(&self, url: &str) -> Result<Vec<String>> {
        let row = self
            .client
            .query_opt(
                r#"
                SELECT mime_types FROM fhir_endpoints_info
                WHERE url = $1
                ORDER BY (requested_fhir_version = 'None') DESC, updated_at DESC
                LIMIT 1
                "#,
                &[&url],
            )
            .await?;
        Ok(row.map(|row| row.get(0)).unwrap_or_default())
    }
}
