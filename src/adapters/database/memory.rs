//! Endpoint store held in process memory
//!
//! Selected with `database_target = "memory"`. Useful for dry runs and as the
//! store behind the ingestion tests, which inspect its rows directly.

use super::traits::EndpointStore;
use crate::domain::{
    EndpointInfo, EndpointMetadata, HistoryEntry, HistoryOperation, InfoId, LanternError,
    MetadataId, RequestedVersion, Result, VendorId, VersionsResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

type InfoKey = (String, RequestedVersion);

#[derive(Debug, Default)]
struct Tables {
    metadata: Vec<EndpointMetadata>,
    infos: HashMap<InfoKey, EndpointInfo>,
    history: Vec<HistoryEntry>,
    versions: HashMap<String, VersionsResponse>,
    vendors: Vec<(VendorId, String)>,
    next_info_id: i64,
}

/// [`EndpointStore`] backed by `RwLock`-guarded maps
#[derive(Debug, Default)]
pub struct InMemoryEndpointStore {
    tables: RwLock<Tables>,
}

impl InMemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vendor and returns its identifier
    pub async fn add_vendor(&self, name: impl Into<String>) -> VendorId {
        let mut tables = self.tables.write().await;
        let id = VendorId::new(tables.vendors.len() as i64 + 1);
        tables.vendors.push((id, name.into()));
        id
    }

    /// Every metadata row, in insertion order
    pub async fn metadata_rows(&self) -> Vec<EndpointMetadata> {
        self.tables.read().await.metadata.clone()
    }

    /// Every current info row, ordered by key
    pub async fn info_rows(&self) -> Vec<EndpointInfo> {
        let tables = self.tables.read().await;
        let mut rows: Vec<EndpointInfo> = tables.infos.values().cloned().collect();
        rows.sort_by(|a, b| {
            (&a.url, &a.requested_fhir_version).cmp(&(&b.url, &b.requested_fhir_version))
        });
        rows
    }

    /// Every history row, in insertion order
    pub async fn history_rows(&self) -> Vec<HistoryEntry> {
        self.tables.read().await.history.clone()
    }

    fn key(url: &str, version: &RequestedVersion) -> InfoKey {
        (url.to_string(), version.clone())
    }

    fn metadata_for(tables: &Tables, id: MetadataId) -> Option<&EndpointMetadata> {
        usize::try_from(id.value() - 1)
            .ok()
            .and_then(|idx| tables.metadata.get(idx))
    }
}

#[async_trait]
impl EndpointStore for InMemoryEndpointStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn get_current_info(
        &self,
        url: &str,
        version: &RequestedVersion,
    ) -> Result<Option<EndpointInfo>> {
        let tables = self.tables.read().await;
        let Some(stored) = tables.infos.get(&Self::key(url, version)) else {
            return Ok(None);
        };

        let mut info = stored.clone();
        if let Some(metadata) = info
            .metadata_id
            .and_then(|id| Self::metadata_for(&tables, id))
        {
            info.metadata = metadata.clone();
        }
        Ok(Some(info))
    }

    async fn insert_metadata(&self, metadata: &EndpointMetadata) -> Result<MetadataId> {
        let mut tables = self.tables.write().await;
        let id = MetadataId::new(tables.metadata.len() as i64 + 1);
        let mut row = metadata.clone();
        row.id = Some(id);
        tables.metadata.push(row);
        Ok(id)
    }

    async fn insert_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<InfoId> {
        let mut tables = self.tables.write().await;
        let key = Self::key(&info.url, &info.requested_fhir_version);
        if tables.infos.contains_key(&key) {
            return Err(LanternError::Storage(format!(
                "endpoint info for {} at version {} already exists",
                info.url, info.requested_fhir_version
            )));
        }

        tables.next_info_id += 1;
        let id = InfoId::new(tables.next_info_id);
        let now = Utc::now();
        let mut row = info.clone();
        row.id = Some(id);
        row.metadata_id = Some(metadata_id);
        row.created_at = Some(now);
        row.updated_at = Some(now);
        tables.infos.insert(key, row);
        Ok(id)
    }

    async fn update_info(&self, info: &EndpointInfo, metadata_id: MetadataId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = Self::key(&info.url, &info.requested_fhir_version);
        let row = tables.infos.get_mut(&key).ok_or_else(|| {
            LanternError::Storage(format!(
                "no endpoint info for {} at version {}",
                info.url, info.requested_fhir_version
            ))
        })?;

        let (id, created_at) = (row.id, row.created_at);
        *row = info.clone();
        row.id = id;
        row.created_at = created_at;
        row.metadata_id = Some(metadata_id);
        row.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn relink_metadata(&self, info_id: InfoId, metadata_id: MetadataId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .infos
            .values_mut()
            .find(|row| row.id == Some(info_id))
            .ok_or_else(|| LanternError::Storage(format!("no endpoint info with id {info_id}")))?;
        row.metadata_id = Some(metadata_id);
        row.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_info(&self, info: &EndpointInfo) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .infos
            .remove(&Self::key(&info.url, &info.requested_fhir_version));
        Ok(())
    }

    async fn append_history(
        &self,
        info: &EndpointInfo,
        metadata_id: MetadataId,
        operation: HistoryOperation,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.history.push(HistoryEntry {
            operation,
            entered_at: Utc::now(),
            metadata_id,
            info: info.clone(),
        });
        Ok(())
    }

    async fn infos_with_other_versions(
        &self,
        url: &str,
        keep: &[RequestedVersion],
    ) -> Result<Vec<EndpointInfo>> {
        let tables = self.tables.read().await;
        Ok(tables
            .infos
            .values()
            .filter(|row| row.url == url && !keep.contains(&row.requested_fhir_version))
            .cloned()
            .collect())
    }

    async fn get_versions_response(&self, url: &str) -> Result<Option<VersionsResponse>> {
        Ok(self.tables.read().await.versions.get(url).cloned())
    }

    async fn save_versions_response(&self, url: &str, response: &VersionsResponse) -> Result<()> {
        self.tables
            .write()
            .await
            .versions
            .insert(url.to_string(), response.clone());
        Ok(())
    }

    async fn find_vendor_by_name(&self, name: &str) -> Result<Option<VendorId>> {
        let wanted = name.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .vendors
            .iter()
            .find(|(_, vendor)| vendor.trim().to_lowercase() == wanted)
            .map(|(id, _)| *id))
    }

    async fn mime_types_for(&self, url: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let preferred = tables.infos.get(&Self::key(url, &RequestedVersion::none()));
        let row = preferred.or_else(|| {
            tables
                .infos
                .values()
                .find(|row| row.url == url && !row.mime_types.is_empty())
        });
        Ok(row.map(|row| row.mime_types.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(url: &str, version: &str) -> EndpointInfo {
        EndpointInfo::new(url, RequestedVersion::new(version))
    }

    #[tokio::test]
    async fn test_insert_and_get_loads_metadata() {
        let store = InMemoryEndpointStore::new();
        let mut metadata = EndpointMetadata::new("https://a.example", RequestedVersion::none());
        metadata.http_response = 200;
        let mid = store.insert_metadata(&metadata).await.unwrap();
        let id = store
            .insert_info(&info("https://a.example", ""), mid)
            .await
            .unwrap();

        let found = store
            .get_current_info("https://a.example", &RequestedVersion::none())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.metadata_id, Some(mid));
        assert_eq!(found.metadata.http_response, 200);
    }

    #[tokio::test]
    async fn test_insert_duplicate_key_fails() {
        let store = InMemoryEndpointStore::new();
        let mid = store
            .insert_metadata(&EndpointMetadata::new("u", RequestedVersion::none()))
            .await
            .unwrap();
        store.insert_info(&info("u", "4.0"), mid).await.unwrap();
        assert!(store.insert_info(&info("u", "4.0"), mid).await.is_err());
    }

    #[tokio::test]
    async fn test_relink_keeps_content() {
        let store = InMemoryEndpointStore::new();
        let first = store
            .insert_metadata(&EndpointMetadata::new("u", RequestedVersion::none()))
            .await
            .unwrap();
        let mut row = info("u", "");
        row.tls_version = "TLS 1.2".to_string();
        let id = store.insert_info(&row, first).await.unwrap();

        let second = store
            .insert_metadata(&EndpointMetadata::new("u", RequestedVersion::none()))
            .await
            .unwrap();
        store.relink_metadata(id, second).await.unwrap();

        let rows = store.info_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata_id, Some(second));
        assert_eq!(rows[0].tls_version, "TLS 1.2");
    }

    #[tokio::test]
    async fn test_infos_with_other_versions() {
        let store = InMemoryEndpointStore::new();
        let mid = store
            .insert_metadata(&EndpointMetadata::new("u", RequestedVersion::none()))
            .await
            .unwrap();
        for version in ["", "3.0", "4.0"] {
            store.insert_info(&info("u", version), mid).await.unwrap();
        }
        store.insert_info(&info("other", "3.0"), mid).await.unwrap();

        let stale = store
            .infos_with_other_versions("u", &[RequestedVersion::none(), RequestedVersion::new("4.0")])
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].requested_fhir_version.as_str(), "3.0");
    }

    #[tokio::test]
    async fn test_find_vendor_ignores_case_and_whitespace() {
        let store = InMemoryEndpointStore::new();
        let id = store.add_vendor("Epic Systems Corporation").await;
        assert_eq!(
            store
                .find_vendor_by_name("  epic systems corporation ")
                .await
                .unwrap(),
            Some(id)
        );
        assert_eq!(store.find_vendor_by_name("Cerner").await.unwrap(), None);
    }
}
