//! Recording session coordinator
//!
//! Wires the capture controller, the metadata store and the file store into
//! the user-facing operations: start, stop, delete, export, audit and watch.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::capture::CaptureState;
use crate::domain::config::DEFAULT_DESCRIPTION;
use crate::domain::recording::{name_from_file, AudioMimeType, MetadataRecord, SortKey};

use super::capture::{CaptureController, CaptureError, CaptureEvent, PersistedCapture};
use super::context::AppContext;
use super::ports::{AudioDevice, FileError};
use super::store::{LiveQuery, StoreError};

/// Errors from the coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    File(#[from] FileError),
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Description given to new recordings
    pub description: String,
    /// Rewrite `isRecording` to false once the file is written
    pub clear_recording_flag: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            clear_recording_flag: true,
        }
    }
}

/// Result of stopping a capture
#[derive(Debug, Clone)]
pub struct StopOutcome {
    /// The record as it stands after finalization; `None` if it was
    /// deleted while recording
    pub record: Option<MetadataRecord>,
    pub capture: PersistedCapture,
}

/// Result of deleting a recording.
///
/// The metadata step always succeeded when this is returned; the file step
/// is best-effort and its outcome is carried separately.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub record: MetadataRecord,
    pub file: Result<(), FileError>,
}

impl DeleteOutcome {
    /// Whether the audio file was removed too
    pub fn file_removed(&self) -> bool {
        self.file.is_ok()
    }
}

/// Consistency report between metadata records and audio files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Records whose audio file is missing
    pub records_without_files: Vec<String>,
    /// Audio files with no metadata record
    pub files_without_records: Vec<String>,
    /// Records still flagged as recording
    pub in_progress: Vec<String>,
}

impl AuditReport {
    /// True when every record has a file and every file has a record
    pub fn is_consistent(&self) -> bool {
        self.records_without_files.is_empty() && self.files_without_records.is_empty()
    }
}

/// Recording session coordinator
pub struct RecordingCoordinator {
    context: AppContext,
    controller: CaptureController,
    config: CoordinatorConfig,
}

impl RecordingCoordinator {
    /// Create a coordinator over an opened context
    pub fn new(context: AppContext, device: Arc<dyn AudioDevice>, config: CoordinatorConfig) -> Self {
        Self {
            context,
            controller: CaptureController::new(device),
            config,
        }
    }

    /// The shared application context
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Current capture state
    pub async fn capture_state(&self) -> CaptureState {
        self.controller.state().await
    }

    /// Subscribe to capture lifecycle notifications
    pub fn subscribe_capture_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.controller.subscribe()
    }

    /// Begin a new recording.
    ///
    /// The placeholder record is inserted before any audio is captured and
    /// appears in live queries immediately.
    pub async fn start_capture(&self) -> Result<MetadataRecord, CoordinatorError> {
        let record = self
            .controller
            .start(&self.context.store, &self.config.description)
            .await?;
        info!(name = %record.name, "Capture started");
        Ok(record)
    }

    /// Stop the active recording and persist its audio
    pub async fn stop_capture(&self) -> Result<StopOutcome, CoordinatorError> {
        let capture = self.controller.stop(self.context.files.as_ref()).await?;
        let store = &self.context.store;

        let record = match store.get(&capture.name).await {
            Some(record) if self.config.clear_recording_flag => {
                let completed = record.completed();
                match store.update(completed.clone()).await {
                    Ok(()) => Some(completed),
                    Err(e) => {
                        warn!(name = %capture.name, error = %e, "Failed to clear recording flag");
                        store.refresh().await;
                        Some(record)
                    }
                }
            }
            Some(record) => {
                store.refresh().await;
                Some(record)
            }
            None => {
                // Deleted while recording; the file is kept and shows up in audits
                warn!(name = %capture.name, "Record disappeared before capture finished");
                store.refresh().await;
                None
            }
        };

        self.controller.finish(&capture).await?;
        info!(name = %capture.name, bytes = capture.size_bytes, "Capture stopped");
        Ok(StopOutcome { record, capture })
    }

    /// Delete a recording's metadata, then its audio file.
    ///
    /// A missing record fails the whole operation. A file failure is logged
    /// and reported in the outcome; the record stays deleted.
    pub async fn delete_recording(
        &self,
        record: &MetadataRecord,
    ) -> Result<DeleteOutcome, CoordinatorError> {
        let removed = self.context.store.remove(&record.name).await?;

        let file = self.context.files.remove(&record.file_name()).await;
        match &file {
            Ok(()) => debug!(name = %record.name, "Audio file removed"),
            Err(e) => warn!(name = %record.name, error = %e, "Failed to remove audio file"),
        }

        self.context.store.refresh().await;
        info!(name = %record.name, "Recording deleted");
        Ok(DeleteOutcome {
            record: removed,
            file,
        })
    }

    /// Delete a recording by name
    pub async fn delete_by_name(&self, name: &str) -> Result<DeleteOutcome, CoordinatorError> {
        let record = self
            .context
            .store
            .get(name)
            .await
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        self.delete_recording(&record).await
    }

    /// Read the audio bytes of a recording
    pub async fn read_recording(&self, name: &str) -> Result<Vec<u8>, CoordinatorError> {
        let record = self
            .context
            .store
            .get(name)
            .await
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(self.context.files.read(&record.file_name()).await?)
    }

    /// Live, sorted view over every recording
    pub async fn watch(&self, sort_key: SortKey) -> LiveQuery {
        self.context.store.query_all(sort_key).await
    }

    /// Compare metadata records against files in the audio root
    pub async fn audit(&self) -> Result<AuditReport, CoordinatorError> {
        let records = self.context.store.snapshot(SortKey::Name).await;
        let names: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();

        // Unclaimed files only count when they hold WebM audio
        let mut files = BTreeSet::new();
        for file_name in self.context.files.list().await? {
            let Some(name) = name_from_file(&file_name) else {
                continue;
            };
            if !names.contains(name) && !self.is_audio_file(&file_name).await {
                debug!(file = %file_name, "Skipping non-audio file");
                continue;
            }
            files.insert(name.to_string());
        }

        // The live session has no file yet
        let active = self.controller.current_recording().await;

        let report = AuditReport {
            records_without_files: records
                .iter()
                .filter(|r| !files.contains(&r.name))
                .filter(|r| active.as_deref() != Some(r.name.as_str()))
                .map(|r| r.name.clone())
                .collect(),
            files_without_records: files
                .iter()
                .filter(|f| !names.contains(f.as_str()))
                .cloned()
                .collect(),
            in_progress: records
                .iter()
                .filter(|r| r.is_recording())
                .map(|r| r.name.clone())
                .collect(),
        };

        debug!(
            records = records.len(),
            files = files.len(),
            consistent = report.is_consistent(),
            "Audit complete"
        );
        Ok(report)
    }

    /// Whether a file starts with a WebM header
    async fn is_audio_file(&self, file_name: &str) -> bool {
        match self
            .context
            .files
            .read_head(file_name, AudioMimeType::SNIFF_LEN)
            .await
        {
            Ok(head) => AudioMimeType::sniff(&head).is_some(),
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to inspect audio file");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::MetadataStore;
    use crate::domain::schema::{ConflictPolicy, SchemaDescriptor, SchemaFingerprint};
    use crate::infrastructure::device::{ChannelDevice, ChannelFeed};
    use crate::infrastructure::metadata::MemoryStoreBackend;
    use crate::infrastructure::storage::AudioDirectory;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        feed: ChannelFeed,
        coordinator: RecordingCoordinator,
    }

    async fn fixture(config: CoordinatorConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(
            Arc::new(MemoryStoreBackend::new()),
            "audioDB",
            SchemaFingerprint::of(&SchemaDescriptor::audio()),
            ConflictPolicy::Rebuild,
        )
        .await
        .unwrap();
        let files = AudioDirectory::new(dir.path().join("audio"));
        let context = AppContext::new(Arc::new(store), Arc::new(files));
        let (device, feed) = ChannelDevice::new();
        Fixture {
            dir,
            feed,
            coordinator: RecordingCoordinator::new(context, Arc::new(device), config),
        }
    }

    #[tokio::test]
    async fn start_stop_produces_record_and_file() {
        let f = fixture(CoordinatorConfig::default()).await;
        let mut live = f.coordinator.watch(SortKey::Name).await;
        assert!(live.next().await.unwrap().is_empty());

        let started = f.coordinator.start_capture().await.unwrap();
        let emitted = live.next().await.unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_recording());
        assert_eq!(emitted[0].description, DEFAULT_DESCRIPTION);

        f.feed.push(b"abc".to_vec());
        f.feed.push(b"def".to_vec());
        let outcome = f.coordinator.stop_capture().await.unwrap();

        let record = outcome.record.unwrap();
        assert_eq!(record.name, started.name);
        assert_eq!(record.is_recording, Some(false));
        assert_eq!(f.coordinator.capture_state().await, CaptureState::Idle);

        let bytes = f.coordinator.read_recording(&started.name).await.unwrap();
        assert_eq!(bytes, b"abcdef");
        assert!(f
            .dir
            .path()
            .join("audio")
            .join(format!("{}.webm", started.name))
            .exists());
    }

    #[tokio::test]
    async fn keeping_recording_flag_only_refreshes() {
        let f = fixture(CoordinatorConfig {
            clear_recording_flag: false,
            ..Default::default()
        })
        .await;

        f.coordinator.start_capture().await.unwrap();
        f.feed.push(vec![1]);
        let outcome = f.coordinator.stop_capture().await.unwrap();

        assert_eq!(outcome.record.unwrap().is_recording, Some(true));
    }

    #[tokio::test]
    async fn delete_removes_record_and_file() {
        let f = fixture(CoordinatorConfig::default()).await;
        f.coordinator.start_capture().await.unwrap();
        f.feed.push(vec![1, 2]);
        let stopped = f.coordinator.stop_capture().await.unwrap();

        let record = stopped.record.unwrap();
        let outcome = f.coordinator.delete_recording(&record).await.unwrap();

        assert!(outcome.file_removed());
        assert!(f.coordinator.context().store.is_empty().await);
        assert!(!stopped.capture.path.exists());
    }

    #[tokio::test]
    async fn delete_with_missing_file_still_removes_record() {
        let f = fixture(CoordinatorConfig::default()).await;
        let record = MetadataRecord::recording("ghost", "x", "2024-01-01T00:00:00Z");
        f.coordinator
            .context()
            .store
            .insert(record.clone())
            .await
            .unwrap();

        let outcome = f.coordinator.delete_recording(&record).await.unwrap();

        assert!(!outcome.file_removed());
        assert!(matches!(outcome.file, Err(FileError::NotFound(_))));
        assert!(f.coordinator.context().store.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn delete_unknown_record_fails_and_keeps_file() {
        let f = fixture(CoordinatorConfig::default()).await;
        let audio = f.dir.path().join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(audio.join("stray.webm"), b"x").unwrap();

        let stray = MetadataRecord::recording("stray", "x", "2024-01-01T00:00:00Z");
        let err = f.coordinator.delete_recording(&stray).await.unwrap_err();

        assert!(matches!(err, CoordinatorError::Store(StoreError::NotFound(_))));
        assert!(audio.join("stray.webm").exists());
    }

    #[tokio::test]
    async fn audit_reports_both_kinds_of_orphans() {
        let f = fixture(CoordinatorConfig::default()).await;
        let audio = f.dir.path().join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(audio.join("lonely.webm"), [0x1A, 0x45, 0xDF, 0xA3, 0x01]).unwrap();
        std::fs::write(audio.join("notes.txt"), b"x").unwrap();
        f.coordinator
            .context()
            .store
            .insert(MetadataRecord::recording("missing", "x", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        let report = f.coordinator.audit().await.unwrap();

        assert_eq!(report.records_without_files, vec!["missing".to_string()]);
        assert_eq!(report.files_without_records, vec!["lonely".to_string()]);
        assert_eq!(report.in_progress, vec!["missing".to_string()]);
        assert!(!report.is_consistent());
    }

    #[tokio::test]
    async fn audit_skips_unclaimed_files_without_webm_header() {
        let f = fixture(CoordinatorConfig::default()).await;
        let audio = f.dir.path().join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(audio.join("renamed.webm"), b"OggS\0\0").unwrap();
        std::fs::write(audio.join("empty.webm"), b"").unwrap();

        let report = f.coordinator.audit().await.unwrap();
        assert!(report.files_without_records.is_empty());
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn audit_counts_claimed_file_whatever_its_content() {
        let f = fixture(CoordinatorConfig::default()).await;
        f.coordinator.start_capture().await.unwrap();
        let stopped = f.coordinator.stop_capture().await.unwrap();
        assert_eq!(stopped.capture.size_bytes, 0);

        let report = f.coordinator.audit().await.unwrap();
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn audit_ignores_the_live_session() {
        let f = fixture(CoordinatorConfig::default()).await;
        f.coordinator.start_capture().await.unwrap();

        let report = f.coordinator.audit().await.unwrap();
        assert!(report.records_without_files.is_empty());
        assert_eq!(report.in_progress.len(), 1);
    }

    #[tokio::test]
    async fn read_unknown_recording_is_not_found() {
        let f = fixture(CoordinatorConfig::default()).await;
        let err = f.coordinator.read_recording("nope").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Store(StoreError::NotFound(_))));
    }
}
