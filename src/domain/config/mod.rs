//! Configuration domain

mod app_config;

pub use app_config::{default_data_dir, AppConfig, DEFAULT_DESCRIPTION, DEFAULT_STORE_NAME};
