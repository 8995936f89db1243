//! Metadata store persistence port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::MetadataRecord;
use crate::domain::schema::SchemaFingerprint;

/// Store backend errors
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The persisted namespace cannot be read under the requested schema
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Io(String),
}

/// Port for persisting the records of one store namespace
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load every record of a namespace.
    ///
    /// # Returns
    /// `None` if the namespace does not exist yet, or a `Conflict` error if
    /// it exists but does not match the fingerprint.
    async fn load(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
    ) -> Result<Option<Vec<MetadataRecord>>, BackendError>;

    /// Replace the content of a namespace
    async fn save(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
        records: &[MetadataRecord],
    ) -> Result<(), BackendError>;

    /// Delete a namespace and everything in it
    async fn destroy(&self, namespace: &str) -> Result<(), BackendError>;
}
