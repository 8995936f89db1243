//! XDG config store adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::schema::ConflictPolicy;

/// Directory under the platform config dir
const APP_DIR_NAME: &str = "audio-vault";

/// XDG-compliant config store
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    /// Create a new XDG config store with default path
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR_NAME);

        Self {
            path: config_dir.join("config.toml"),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse TOML content into AppConfig, rejecting unusable values
    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(policy) = &config.on_schema_conflict {
            policy
                .parse::<ConflictPolicy>()
                .map_err(|e| ConfigError::ValidationError {
                    key: "on_schema_conflict".to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(config)
    }

    /// Serialize AppConfig to TOML
    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config)
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            // Return empty config if file doesn't exist
            return Ok(AppConfig::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(config)?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        let defaults = AppConfig::defaults();
        self.save(&defaults).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_path_is_xdg() {
        let store = XdgConfigStore::new();
        let path = store.path();
        assert!(path.to_string_lossy().contains("audio-vault"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn custom_path() {
        let store = XdgConfigStore::with_path("/custom/path/config.toml");
        assert_eq!(store.path(), PathBuf::from("/custom/path/config.toml"));
    }

    #[test]
    fn parse_toml_flat_format() {
        let content = r#"
audio_dir = "/srv/audio"
store_name = "clipsDB"
on_schema_conflict = "fail"
clear_recording_flag = false
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.audio_dir, Some("/srv/audio".to_string()));
        assert_eq!(config.store_name, Some("clipsDB".to_string()));
        assert_eq!(config.conflict_policy_or_default(), ConflictPolicy::Fail);
        assert_eq!(config.clear_recording_flag, Some(false));
    }

    #[test]
    fn parse_toml_rejects_unknown_policy() {
        let err = XdgConfigStore::parse_toml(r#"on_schema_conflict = "merge""#).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
    }

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested/config.toml"));

        store.init().await.unwrap();
        assert!(store.exists());
        assert_eq!(store.load().await.unwrap(), AppConfig::defaults());

        assert!(matches!(
            store.init().await,
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let config = AppConfig {
            description: Some("Voice memo".to_string()),
            clear_recording_flag: Some(false),
            ..Default::default()
        };

        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }
}
