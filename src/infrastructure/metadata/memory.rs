//! In-memory store backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::application::ports::{BackendError, StoreBackend};
use crate::domain::recording::MetadataRecord;
use crate::domain::schema::SchemaFingerprint;

enum Namespace {
    Stored {
        fingerprint: SchemaFingerprint,
        records: Vec<MetadataRecord>,
    },
    /// Data that cannot be read under any schema
    Corrupt,
}

/// Store backend that keeps namespaces in process memory.
///
/// Nothing survives the process; useful for tests and dry runs.
#[derive(Default)]
pub struct MemoryStoreBackend {
    namespaces: Mutex<HashMap<String, Namespace>>,
    fail_writes: AtomicBool,
}

impl MemoryStoreBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn namespaces(&self) -> MutexGuard<'_, HashMap<String, Namespace>> {
        self.namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace a namespace with unreadable data
    pub fn corrupt(&self, namespace: &str) {
        self.namespaces()
            .insert(namespace.to_string(), Namespace::Corrupt);
    }

    /// Whether a namespace currently holds unreadable data
    pub fn is_corrupt(&self, namespace: &str) -> bool {
        matches!(self.namespaces().get(namespace), Some(Namespace::Corrupt))
    }

    /// Whether a namespace exists
    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces().contains_key(namespace)
    }

    /// Make every following save fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for MemoryStoreBackend {
    async fn load(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
    ) -> Result<Option<Vec<MetadataRecord>>, BackendError> {
        match self.namespaces().get(namespace) {
            None => Ok(None),
            Some(Namespace::Corrupt) => Err(BackendError::Conflict(format!(
                "namespace {} is unreadable",
                namespace
            ))),
            Some(Namespace::Stored {
                fingerprint: stored,
                records,
            }) => {
                if *stored != fingerprint {
                    return Err(BackendError::Conflict(format!(
                        "namespace was written with schema {}, expected {}",
                        stored, fingerprint
                    )));
                }
                Ok(Some(records.clone()))
            }
        }
    }

    async fn save(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
        records: &[MetadataRecord],
    ) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Io("writes are disabled".to_string()));
        }
        self.namespaces().insert(
            namespace.to_string(),
            Namespace::Stored {
                fingerprint,
                records: records.to_vec(),
            },
        );
        Ok(())
    }

    async fn destroy(&self, namespace: &str) -> Result<(), BackendError> {
        self.namespaces().remove(namespace);
        Ok(())
    }
}
