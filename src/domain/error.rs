//! Configuration errors

use thiserror::Error;

/// Failures reading, writing or validating the config file
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Key outside the set accepted by `config get/set`
    #[error("Unknown key '{key}'. Valid keys: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
