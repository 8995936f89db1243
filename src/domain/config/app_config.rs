//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::schema::ConflictPolicy;

/// Base name of the metadata store namespace
pub const DEFAULT_STORE_NAME: &str = "audioDB";

/// Description given to new recordings
pub const DEFAULT_DESCRIPTION: &str = "New recording";

const APP_DIR_NAME: &str = "audio-vault";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub audio_dir: Option<String>,
    pub data_dir: Option<String>,
    pub store_name: Option<String>,
    pub description: Option<String>,
    pub on_schema_conflict: Option<String>,
    pub clear_recording_flag: Option<bool>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        let data_dir = default_data_dir();
        Self {
            audio_dir: Some(data_dir.join("audio").to_string_lossy().to_string()),
            data_dir: Some(data_dir.to_string_lossy().to_string()),
            store_name: Some(DEFAULT_STORE_NAME.to_string()),
            description: Some(DEFAULT_DESCRIPTION.to_string()),
            on_schema_conflict: Some(ConflictPolicy::default().to_string()),
            clear_recording_flag: Some(true),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            audio_dir: other.audio_dir.or(self.audio_dir),
            data_dir: other.data_dir.or(self.data_dir),
            store_name: other.store_name.or(self.store_name),
            description: other.description.or(self.description),
            on_schema_conflict: other.on_schema_conflict.or(self.on_schema_conflict),
            clear_recording_flag: other.clear_recording_flag.or(self.clear_recording_flag),
        }
    }

    /// Get the data directory, or the platform default if not set
    pub fn data_dir_or_default(&self) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir)
    }

    /// Get the audio root, or `<data dir>/audio` if not set
    pub fn audio_dir_or_default(&self) -> PathBuf {
        self.audio_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("audio"))
    }

    /// Get the store base name, or "audioDB" if not set
    pub fn store_name_or_default(&self) -> &str {
        self.store_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STORE_NAME)
    }

    /// Get the description for new recordings
    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
    }

    /// Get the schema conflict policy, or rebuild if not set/invalid
    pub fn conflict_policy_or_default(&self) -> ConflictPolicy {
        self.on_schema_conflict
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get whether finalize clears the isRecording flag, or true if not set
    pub fn clear_recording_flag_or_default(&self) -> bool {
        self.clear_recording_flag.unwrap_or(true)
    }
}

/// Platform data directory for the application
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert_eq!(config.store_name, Some("audioDB".to_string()));
        assert_eq!(config.description, Some("New recording".to_string()));
        assert_eq!(config.on_schema_conflict, Some("rebuild".to_string()));
        assert_eq!(config.clear_recording_flag, Some(true));
        assert!(config.audio_dir.unwrap().contains("audio-vault"));
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.audio_dir.is_none());
        assert!(config.data_dir.is_none());
        assert!(config.store_name.is_none());
        assert!(config.clear_recording_flag.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            audio_dir: Some("/base/audio".to_string()),
            store_name: Some("baseDB".to_string()),
            ..Default::default()
        };

        let other = AppConfig {
            audio_dir: Some("/other/audio".to_string()),
            store_name: None, // Should not override
            ..Default::default()
        };

        let merged = base.merge(other);

        assert_eq!(merged.audio_dir, Some("/other/audio".to_string()));
        assert_eq!(merged.store_name, Some("baseDB".to_string()));
    }

    #[test]
    fn audio_dir_falls_back_to_data_dir() {
        let config = AppConfig {
            data_dir: Some("/var/lib/vault".to_string()),
            ..Default::default()
        };
        assert_eq!(config.audio_dir_or_default(), PathBuf::from("/var/lib/vault/audio"));
    }

    #[test]
    fn conflict_policy_uses_default_on_invalid() {
        let config = AppConfig {
            on_schema_conflict: Some("migrate".to_string()),
            ..Default::default()
        };
        assert_eq!(config.conflict_policy_or_default(), ConflictPolicy::Rebuild);

        let config = AppConfig {
            on_schema_conflict: Some("fail".to_string()),
            ..Default::default()
        };
        assert_eq!(config.conflict_policy_or_default(), ConflictPolicy::Fail);
    }

    #[test]
    fn empty_store_name_uses_default() {
        let config = AppConfig {
            store_name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.store_name_or_default(), "audioDB");
    }

    #[test]
    fn clear_recording_flag_defaults_to_true() {
        assert!(AppConfig::empty().clear_recording_flag_or_default());
    }
}
