//! Process-wide key-value state port

use async_trait::async_trait;
use thiserror::Error;

/// State storage errors
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("Failed to read state: {0}")]
    ReadError(String),

    #[error("Failed to write state: {0}")]
    WriteError(String),
}

/// Port for small string values that survive process restarts
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StateError>;
}
