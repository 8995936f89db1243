//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::recording::SortKey;

/// Audio Vault - local-first audio recorder and library
#[derive(Parser, Debug)]
#[command(name = "audio-vault")]
#[command(version)]
#[command(about = "Record microphone audio and keep it in a local library")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Directory holding the audio files
    #[arg(long, value_name = "DIR", global = true)]
    pub audio_dir: Option<String>,

    /// Directory holding metadata and state
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record from the microphone until Enter or Ctrl+C
    Record {
        /// Description stored with the recording
        #[arg(short = 'd', long, value_name = "TEXT")]
        description: Option<String>,

        /// Stop automatically after this many seconds
        #[arg(short = 's', long, value_name = "N")]
        seconds: Option<u64>,
    },
    /// Import an existing audio file as a new recording
    Import {
        /// Audio file to import
        file: PathBuf,

        /// Description stored with the recording
        #[arg(short = 'd', long, value_name = "TEXT")]
        description: Option<String>,
    },
    /// List recordings
    List {
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
    },
    /// Print the recording list again whenever it changes
    Watch {
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
    },
    /// Delete a recording and its audio file
    Delete {
        /// Recording name
        name: String,
    },
    /// Copy a recording's audio to a file
    Export {
        /// Recording name
        name: String,
        /// Destination path
        dest: PathBuf,
    },
    /// Check that every record has a file and every file a record
    Audit,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Sort order argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Name,
    CreatedAt,
    Description,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::CreatedAt => SortKey::CreatedAt,
            SortArg::Description => SortKey::Description,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "audio_dir",
    "data_dir",
    "store_name",
    "description",
    "on_schema_conflict",
    "clear_recording_flag",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_record_defaults() {
        let cli = Cli::parse_from(["audio-vault", "record"]);
        assert!(!cli.verbose);
        assert!(cli.audio_dir.is_none());
        assert!(matches!(
            cli.command,
            Commands::Record {
                description: None,
                seconds: None
            }
        ));
    }

    #[test]
    fn cli_parses_record_options() {
        let cli = Cli::parse_from(["audio-vault", "record", "-d", "Standup", "--seconds", "5"]);
        if let Commands::Record {
            description,
            seconds,
        } = cli.command
        {
            assert_eq!(description, Some("Standup".to_string()));
            assert_eq!(seconds, Some(5));
        } else {
            panic!("Expected Record command");
        }
    }

    #[test]
    fn global_dirs_after_subcommand() {
        let cli = Cli::parse_from([
            "audio-vault",
            "list",
            "--data-dir",
            "/tmp/d",
            "--audio-dir",
            "/tmp/a",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some("/tmp/d".to_string()));
        assert_eq!(cli.audio_dir, Some("/tmp/a".to_string()));
    }

    #[test]
    fn cli_parses_list_sort() {
        let cli = Cli::parse_from(["audio-vault", "list", "--sort", "created-at"]);
        assert!(matches!(
            cli.command,
            Commands::List {
                sort: SortArg::CreatedAt
            }
        ));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["audio-vault", "config", "set", "store_name", "clipsDB"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "store_name");
            assert_eq!(value, "clipsDB");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn sort_arg_converts_to_sort_key() {
        assert_eq!(SortKey::from(SortArg::Name), SortKey::Name);
        assert_eq!(SortKey::from(SortArg::CreatedAt), SortKey::CreatedAt);
        assert_eq!(SortKey::from(SortArg::Description), SortKey::Description);
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("audio_dir"));
        assert!(is_valid_config_key("on_schema_conflict"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
