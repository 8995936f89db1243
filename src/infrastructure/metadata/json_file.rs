//! JSON file store backend
//!
//! Each namespace is one file, `<dir>/<namespace>.json`:
//!
//! ```json
//! { "schema": "1a2b3c4d", "records": [ { "name": "...", "createdAt": "..." } ] }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::application::ports::{BackendError, StoreBackend};
use crate::domain::recording::MetadataRecord;
use crate::domain::schema::SchemaFingerprint;

#[derive(Deserialize)]
struct NamespaceFile {
    schema: String,
    records: Vec<MetadataRecord>,
}

#[derive(Serialize)]
struct NamespaceFileRef<'a> {
    schema: String,
    records: &'a [MetadataRecord],
}

/// Store backend writing one JSON document per namespace
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the namespace files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a namespace
    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", namespace))
    }

    fn parse(
        content: &str,
        fingerprint: SchemaFingerprint,
    ) -> Result<Vec<MetadataRecord>, BackendError> {
        let file: NamespaceFile = serde_json::from_str(content)
            .map_err(|e| BackendError::Conflict(format!("unreadable store file: {}", e)))?;

        if file.schema != fingerprint.to_string() {
            return Err(BackendError::Conflict(format!(
                "store file was written with schema {}, expected {}",
                file.schema, fingerprint
            )));
        }
        Ok(file.records)
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn load(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
    ) -> Result<Option<Vec<MetadataRecord>>, BackendError> {
        let path = self.path_for(namespace);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackendError::Io(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::parse(&content, fingerprint).map(Some)
    }

    async fn save(
        &self,
        namespace: &str,
        fingerprint: SchemaFingerprint,
        records: &[MetadataRecord],
    ) -> Result<(), BackendError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BackendError::Io(format!("failed to create {}: {}", self.dir.display(), e)))?;

        let content = serde_json::to_string_pretty(&NamespaceFileRef {
            schema: fingerprint.to_string(),
            records,
        })
        .map_err(|e| BackendError::Io(e.to_string()))?;

        let path = self.path_for(namespace);
        fs::write(&path, content)
            .await
            .map_err(|e| BackendError::Io(format!("failed to write {}: {}", path.display(), e)))
    }

    async fn destroy(&self, namespace: &str) -> Result<(), BackendError> {
        let path = self.path_for(namespace);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
