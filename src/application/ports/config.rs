//! Configuration port

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Persistent layer of the configuration merge (`defaults < file < env < cli`)
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the file layer. A missing file yields [`AppConfig::empty`].
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Replace the file layer
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    /// Location of the backing file
    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write [`AppConfig::defaults`]. Fails with `AlreadyExists` rather than
    /// overwrite.
    async fn init(&self) -> Result<(), ConfigError>;

    /// Like [`load`](ConfigStore::load), but an unreadable or invalid file
    /// counts as empty.
    async fn load_or_empty(&self) -> AppConfig {
        match self.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path().display(), error = %e, "Ignoring unreadable config file");
                AppConfig::empty()
            }
        }
    }
}
