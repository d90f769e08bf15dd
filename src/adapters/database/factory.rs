//! Endpoint store factory
//!
//! This module provides the factory function that creates the endpoint store
//! selected by configuration.

use super::memory::InMemoryEndpointStore;
use super::traits::EndpointStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLEndpointStore};
use crate::config::{DatabaseTarget, LanternConfig};
use crate::domain::{LanternError, Result};
use std::sync::Arc;

/// Create an endpoint store based on the configuration
///
/// The PostgreSQL store is connection-tested and its schema applied before it
/// is returned.
///
/// # Errors
///
/// Returns an error if the `[postgresql]` section is missing, the pool cannot
/// be created or the schema cannot be applied.
pub async fn create_endpoint_store(config: &LanternConfig) -> Result<Arc<dyn EndpointStore>> {
    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                LanternError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL endpoint store");
            let client = PostgreSQLClient::new(pg_config.clone())?;
            client.test_connection().await?;
            let store = PostgreSQLEndpointStore::new(client);
            store.ensure_schema().await?;

            Ok(Arc::new(store) as Arc<dyn EndpointStore>)
        }
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory endpoint store");
            Ok(Arc::new(InMemoryEndpointStore::new()) as Arc<dyn EndpointStore>)
        }
    }
}
