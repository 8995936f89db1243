//! File persistence port

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// File persistence errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to {operation} {path}: {message}")]
    Persistence {
        operation: &'static str,
        path: String,
        message: String,
    },
}

impl FileError {
    /// Whether the file did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Port for durable byte storage keyed by file name.
///
/// Every file name is resolved against a fixed root directory. Writes are
/// single operations with no partial-write recovery.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Absolute location of a file name under the root
    fn resolve(&self, file_name: &str) -> PathBuf;

    /// Create or replace a file
    async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<(), FileError>;

    /// Read a whole file
    async fn read(&self, file_name: &str) -> Result<Vec<u8>, FileError>;

    /// Read at most `len` leading bytes of a file
    async fn read_head(&self, file_name: &str, len: usize) -> Result<Vec<u8>, FileError>;

    /// Delete a file
    async fn remove(&self, file_name: &str) -> Result<(), FileError>;

    /// Names of all files under the root
    async fn list(&self) -> Result<Vec<String>, FileError>;
}
