//! Shared application context

use std::sync::Arc;

use crate::domain::schema::ConflictPolicy;

use super::ports::{FileStore, StateStore, StoreBackend};
use super::schema_registry::SchemaRegistry;
use super::store::{MetadataStore, StoreError};

/// Process-wide handles shared by every component.
///
/// Opened once at startup and passed around by reference.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<MetadataStore>,
    pub files: Arc<dyn FileStore>,
}

impl AppContext {
    /// Wrap already opened handles
    pub fn new(store: Arc<MetadataStore>, files: Arc<dyn FileStore>) -> Self {
        Self { store, files }
    }

    /// Check for schema drift, then open the metadata store namespace for the
    /// current schema.
    pub async fn open(
        registry: &SchemaRegistry,
        state: &dyn StateStore,
        backend: Arc<dyn StoreBackend>,
        files: Arc<dyn FileStore>,
        store_name: &str,
        policy: ConflictPolicy,
    ) -> Result<Self, StoreError> {
        registry.check_drift(state).await;

        let store = MetadataStore::open(backend, store_name, registry.fingerprint(), policy).await?;
        Ok(Self::new(Arc::new(store), files))
    }
}
