//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::schema::ConflictPolicy;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::UnknownKey {
        key: key.to_string(),
        valid: VALID_CONFIG_KEYS.join(", "),
    })
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    presenter.output(&read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

/// Store a validated value in the matching field
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "audio_dir" => config.audio_dir = Some(value.to_string()),
        "data_dir" => config.data_dir = Some(value.to_string()),
        "store_name" => config.store_name = Some(value.to_string()),
        "description" => config.description = Some(value.to_string()),
        "on_schema_conflict" => {
            config.on_schema_conflict = Some(value.to_lowercase());
        }
        "clear_recording_flag" => {
            config.clear_recording_flag = Some(parse_bool(value).map_err(|_| bool_error(key))?);
        }
        _ => return check_key(key),
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "audio_dir" => config.audio_dir.clone(),
        "data_dir" => config.data_dir.clone(),
        "store_name" => config.store_name.clone(),
        "description" => config.description.clone(),
        "on_schema_conflict" => config.on_schema_conflict.clone(),
        "clear_recording_flag" => config.clear_recording_flag.map(|b| b.to_string()),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "on_schema_conflict" => {
            value
                .parse::<ConflictPolicy>()
                .map_err(|e| ConfigError::ValidationError {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
        }
        "clear_recording_flag" => {
            parse_bool(value).map_err(|_| bool_error(key))?;
        }
        "store_name" => {
            let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
            if value.is_empty() || !value.chars().all(allowed) {
                return Err(ConfigError::ValidationError {
                    key: key.to_string(),
                    message: "Use letters, digits, '_' or '-'".to_string(),
                });
            }
        }
        "audio_dir" | "data_dir" => {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    key: key.to_string(),
                    message: "Path must not be empty".to_string(),
                });
            }
        }
        _ => {} // description accepts any string
    }
    Ok(())
}

fn bool_error(key: &str) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    }
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}
