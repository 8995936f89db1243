//! Command runners

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::application::ports::{AudioDevice, ConfigStore};
use crate::application::{
    AppContext, CaptureEvent, CoordinatorConfig, CoordinatorError, RecordingCoordinator,
    SchemaRegistry, StoreError,
};
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::{human_readable_size, AudioMimeType, SortKey};
use crate::infrastructure::{
    AudioDirectory, ChannelDevice, JsonFileBackend, JsonStateStore, UnavailableDevice,
    XdgConfigStore,
};

use super::args::{Cli, Commands};
use super::config_cmd::handle_config_command;
use super::presenter::Presenter;
use super::signals::{enter_pressed, ShutdownSignal};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment overrides
pub const ENV_AUDIO_DIR: &str = "AUDIO_VAULT_AUDIO_DIR";
pub const ENV_DATA_DIR: &str = "AUDIO_VAULT_DATA_DIR";

/// Files under the data directory
const STATE_FILE: &str = "state.json";
const METADATA_DIR: &str = "metadata";

const IMPORT_CHUNK_SIZE: usize = 64 * 1024;
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors surfaced by command runners
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Usage(String),

    #[error("Audit found inconsistencies")]
    Inconsistent,
}

/// Dispatch a parsed command line and map the outcome to an exit code
pub async fn run(cli: Cli) -> ExitCode {
    let mut presenter = Presenter::new();
    let cli_config = AppConfig {
        audio_dir: cli.audio_dir,
        data_dir: cli.data_dir,
        ..Default::default()
    };

    let config = load_merged_config(cli_config).await;
    let result = run_command(cli.command, &config, &mut presenter).await;

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        // Findings were already printed
        Err(CliError::Inconsistent) => ExitCode::from(EXIT_ERROR),
        Err(CliError::Usage(message)) => {
            presenter.error(&message);
            ExitCode::from(EXIT_USAGE_ERROR)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let file_config = XdgConfigStore::new().load_or_empty().await;

    // audio_dir follows data_dir unless set explicitly
    let defaults = AppConfig {
        audio_dir: None,
        ..AppConfig::defaults()
    };

    // Merge: defaults < file < env < cli
    defaults
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

fn env_config() -> AppConfig {
    AppConfig {
        audio_dir: env::var(ENV_AUDIO_DIR).ok().filter(|s| !s.is_empty()),
        data_dir: env::var(ENV_DATA_DIR).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Run the schema check and open the library described by `config`
pub async fn open_context(config: &AppConfig) -> Result<AppContext, StoreError> {
    let data_dir = config.data_dir_or_default();
    let audio_dir = config.audio_dir_or_default();
    debug!(
        data_dir = %data_dir.display(),
        audio_dir = %audio_dir.display(),
        "Opening library"
    );

    let state = JsonStateStore::new(data_dir.join(STATE_FILE));
    let backend = Arc::new(JsonFileBackend::new(data_dir.join(METADATA_DIR)));
    let files = Arc::new(AudioDirectory::new(audio_dir));

    AppContext::open(
        &SchemaRegistry::audio(),
        &state,
        backend,
        files,
        config.store_name_or_default(),
        config.conflict_policy_or_default(),
    )
    .await
}

fn coordinator_config(config: &AppConfig, description: Option<String>) -> CoordinatorConfig {
    CoordinatorConfig {
        description: description.unwrap_or_else(|| config.description_or_default().to_string()),
        clear_recording_flag: config.clear_recording_flag_or_default(),
    }
}

#[cfg(feature = "cpal")]
fn microphone() -> Arc<dyn AudioDevice> {
    Arc::new(crate::infrastructure::CpalMicrophone::new())
}

#[cfg(not(feature = "cpal"))]
fn microphone() -> Arc<dyn AudioDevice> {
    Arc::new(UnavailableDevice)
}

/// Coordinator for commands that never capture
fn library(context: AppContext, config: &AppConfig) -> RecordingCoordinator {
    RecordingCoordinator::new(
        context,
        Arc::new(UnavailableDevice),
        coordinator_config(config, None),
    )
}

/// Run one command; only library commands open the data directory
async fn run_command(
    command: Commands,
    config: &AppConfig,
    presenter: &mut Presenter,
) -> Result<(), CliError> {
    match command {
        Commands::Config { action } => {
            handle_config_command(action, &XdgConfigStore::new(), presenter).await?;
            Ok(())
        }
        Commands::Record {
            description,
            seconds,
        } => {
            if seconds == Some(0) {
                return Err(CliError::Usage("--seconds must be at least 1".to_string()));
            }
            let coordinator = RecordingCoordinator::new(
                open_context(config).await?,
                microphone(),
                coordinator_config(config, description),
            );
            run_record(&coordinator, seconds, presenter).await
        }
        Commands::Import { file, description } => {
            let bytes = read_import(&file).await?;
            let context = open_context(config).await?;
            run_import(context, config, &file, bytes, description, presenter).await
        }
        Commands::List { sort } => {
            run_list(&open_context(config).await?, sort.into(), presenter).await
        }
        Commands::Watch { sort } => {
            run_watch(&open_context(config).await?, sort.into(), presenter).await
        }
        Commands::Delete { name } => {
            let coordinator = library(open_context(config).await?, config);
            run_delete(&coordinator, &name, presenter).await
        }
        Commands::Export { name, dest } => {
            let coordinator = library(open_context(config).await?, config);
            run_export(&coordinator, &name, &dest, presenter).await
        }
        Commands::Audit => {
            let report = library(open_context(config).await?, config).audit().await?;
            presenter.audit(&report);
            if report.is_consistent() {
                Ok(())
            } else {
                Err(CliError::Inconsistent)
            }
        }
    }
}

/// Record until Enter, Ctrl+C, the time limit or a device failure
async fn run_record(
    coordinator: &RecordingCoordinator,
    seconds: Option<u64>,
    presenter: &mut Presenter,
) -> Result<(), CliError> {
    let shutdown = ShutdownSignal::new();
    shutdown.setup();
    let mut events = coordinator.subscribe_capture_events();

    let record = coordinator.start_capture().await?;
    presenter.start_spinner(&format!(
        "Recording {} (press Enter or Ctrl+C to stop)",
        record.name
    ));

    let limit = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending::<()>().await,
        }
    };
    let device_failure = async {
        loop {
            match events.recv().await {
                Ok(CaptureEvent::Failed { error, .. }) => return error,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    };

    tokio::select! {
        _ = shutdown.wait() => debug!("Stop requested by Ctrl+C"),
        _ = enter_pressed() => debug!("Stop requested from stdin"),
        _ = limit => debug!("Recording time limit reached"),
        error = device_failure => debug!(error = %error, "Capture failed while recording"),
    }

    match coordinator.stop_capture().await {
        Ok(outcome) => {
            presenter.spinner_success(&format!(
                "Saved {} ({})",
                outcome.capture.path.display(),
                human_readable_size(outcome.capture.size_bytes as u64)
            ));
            presenter.output(&outcome.capture.name);
            Ok(())
        }
        Err(e) => {
            presenter.spinner_fail("Recording failed");
            Err(e.into())
        }
    }
}

/// Read a file to import, accepting only WebM audio
async fn read_import(file: &Path) -> Result<Vec<u8>, CliError> {
    let bytes = fs::read(file)
        .await
        .map_err(|e| CliError::Io(format!("Failed to read {}: {}", file.display(), e)))?;
    if bytes.is_empty() {
        return Err(CliError::Usage(format!("{} is empty", file.display())));
    }
    if AudioMimeType::sniff(&bytes).is_none() {
        return Err(CliError::Usage(format!(
            "{} is not WebM audio (missing EBML header)",
            file.display()
        )));
    }
    Ok(bytes)
}

/// Feed an existing file through the capture pipeline
async fn run_import(
    context: AppContext,
    config: &AppConfig,
    file: &Path,
    bytes: Vec<u8>,
    description: Option<String>,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let (device, feed) = ChannelDevice::new();
    let coordinator =
        RecordingCoordinator::new(context, Arc::new(device), coordinator_config(config, description));

    coordinator.start_capture().await?;
    for chunk in bytes.chunks(IMPORT_CHUNK_SIZE) {
        feed.push(chunk);
    }
    let outcome = coordinator.stop_capture().await?;

    presenter.success(&format!(
        "Imported {} ({})",
        file.display(),
        human_readable_size(outcome.capture.size_bytes as u64)
    ));
    presenter.output(&outcome.capture.name);
    Ok(())
}

async fn run_list(
    context: &AppContext,
    sort: SortKey,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let records = context.store.snapshot(sort).await;
    if records.is_empty() {
        presenter.info("No recordings");
    } else {
        presenter.recordings(&records);
    }
    Ok(())
}

/// Print the listing on every change until Ctrl+C
async fn run_watch(
    context: &AppContext,
    sort: SortKey,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let shutdown = ShutdownSignal::new();
    shutdown.setup();

    let mut query = context.store.query_all(sort).await;
    let mut ticker = tokio::time::interval(WATCH_POLL_INTERVAL);
    presenter.info(&format!("Watching {} (Ctrl+C to stop)", context.store.namespace()));

    loop {
        tokio::select! {
            snapshot = query.next() => {
                let Some(snapshot) = snapshot else { break };
                presenter.info(&format!("{} recording(s), sorted by {}", snapshot.len(), sort));
                presenter.recordings(&snapshot);
            }
            _ = ticker.tick() => {
                if let Err(e) = context.store.reload().await {
                    warn!(error = %e, "Failed to reload metadata");
                }
            }
            _ = shutdown.wait() => break,
        }
    }

    query.cancel();
    Ok(())
}

async fn run_delete(
    coordinator: &RecordingCoordinator,
    name: &str,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let outcome = coordinator.delete_by_name(name).await?;
    match &outcome.file {
        Ok(()) => presenter.success(&format!("Deleted {}", name)),
        Err(e) => presenter.warn(&format!(
            "Deleted record {}, but its audio file was not removed: {}",
            name, e
        )),
    }
    Ok(())
}

async fn run_export(
    coordinator: &RecordingCoordinator,
    name: &str,
    dest: &Path,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let bytes = coordinator.read_recording(name).await?;
    fs::write(dest, &bytes)
        .await
        .map_err(|e| CliError::Io(format!("Failed to write {}: {}", dest.display(), e)))?;

    presenter.success(&format!(
        "Exported {} to {} ({})",
        name,
        dest.display(),
        human_readable_size(bytes.len() as u64)
    ));
    Ok(())
}
