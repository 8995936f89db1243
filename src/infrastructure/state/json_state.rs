//! JSON key-value state file

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{StateError, StateStore};

/// Process-wide state kept in a single JSON object file
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Create a state store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_map(&self) -> Result<BTreeMap<String, String>, StateError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StateError::ReadError(e.to_string())),
        };

        serde_json::from_str(&content).map_err(|e| StateError::ReadError(e.to_string()))
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.load_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        // An unreadable file is replaced rather than blocking every write
        let mut map = self.load_map().await.unwrap_or_default();
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::WriteError(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(&map).map_err(|e| StateError::WriteError(e.to_string()))?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| StateError::WriteError(e.to_string()))
    }
}
