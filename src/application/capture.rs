//! Capture controller
//!
//! Drives one capture session at a time through
//! `Idle -> Acquiring -> Recording -> Finalizing -> Idle | Failed`:
//! acquires a live stream, inserts the placeholder metadata record, buffers
//! the recorder's chunks in arrival order and writes the assembled payload
//! through the file store.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, Weak};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::capture::{CaptureLifecycle, CaptureState};
use crate::domain::recording::{file_name_for, AudioMimeType, AudioPayload, MetadataRecord};

use super::ports::{
    AudioDevice, CaptureConstraints, DeviceError, FileError, FileStore, LiveStream, RecorderEvent,
    RecorderEvents,
};
use super::store::{MetadataStore, StoreError};

/// Errors from the capture controller
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("A recording is already in progress (capture is {0})")]
    AlreadyRecording(CaptureState),

    #[error("No recording in progress (capture is {0})")]
    NotRecording(CaptureState),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to persist recording \"{name}\": {source}")]
    Persistence {
        name: String,
        #[source]
        source: FileError,
    },
}

/// Capture lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The placeholder record exists and the recorder is running
    Started { name: String },
    /// The payload was written and the session is complete
    Persisted { name: String, size_bytes: usize },
    /// The session failed; `name` is set once a record was created
    Failed { name: Option<String>, error: String },
}

/// Result of a successful finalize-and-write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCapture {
    pub name: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: usize,
}

type ChunkBuffer = Arc<StdMutex<Vec<Vec<u8>>>>;

fn lock_chunks(chunks: &ChunkBuffer) -> MutexGuard<'_, Vec<Vec<u8>>> {
    chunks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory state of one in-progress recording
struct CaptureSession {
    name: String,
    stream: Box<dyn LiveStream>,
    mime_type: AudioMimeType,
    chunks: ChunkBuffer,
    collector: JoinHandle<Result<(), DeviceError>>,
}

#[derive(Default)]
struct ControllerInner {
    lifecycle: CaptureLifecycle,
    session: Option<CaptureSession>,
    last_error: Option<DeviceError>,
}

/// State machine turning a live device stream into a durable file
pub struct CaptureController {
    device: Arc<dyn AudioDevice>,
    inner: Arc<Mutex<ControllerInner>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureController {
    /// Create a controller for a device
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            device,
            inner: Arc::new(Mutex::new(ControllerInner::default())),
            events,
        }
    }

    /// Get the current state
    pub async fn state(&self) -> CaptureState {
        self.inner.lock().await.lifecycle.state()
    }

    /// Name of the record belonging to the live session, if any
    pub async fn current_recording(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.name.clone())
    }

    /// Subscribe to capture lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Acquire the microphone, insert the placeholder record and start
    /// buffering chunks.
    ///
    /// # Returns
    /// The inserted record. Fails with `AlreadyRecording` if a session is
    /// active, leaving that session untouched. If the returned future is
    /// dropped before the recorder runs, the stream is released, the
    /// placeholder removed and the controller moves to `Failed`.
    pub async fn start(
        &self,
        store: &Arc<MetadataStore>,
        description: &str,
    ) -> Result<MetadataRecord, CaptureError> {
        let stale = {
            let mut inner = self.inner.lock().await;
            let state = inner.lifecycle.state();
            if state.is_active() {
                warn!(state = %state, "Rejected start: capture already active");
                return Err(CaptureError::AlreadyRecording(state));
            }
            inner
                .lifecycle
                .begin_acquire()
                .map_err(|e| CaptureError::AlreadyRecording(e.current_state))?;
            inner.last_error = None;
            inner.session.take()
        };
        if let Some(session) = stale {
            Self::release(session).await;
        }

        let mut pending = PendingStart {
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
            store: Arc::clone(store),
            name: None,
            stream: None,
            armed: true,
        };

        info!("Requesting audio stream");
        let stream = match self.device.acquire(CaptureConstraints::audio_only()).await {
            Ok(stream) => pending.stream.insert(stream),
            Err(e) => return Err(pending.abort(e).await),
        };
        let mime_type = stream.mime_type();

        let name = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let record = MetadataRecord::recording(&name, description, created_at);

        if let Err(e) = store.insert(record.clone()).await {
            return Err(pending.abort(e).await);
        }
        pending.name = Some(name.clone());

        let started = stream.start().await;
        let events = match started {
            Ok(events) => events,
            Err(e) => return Err(pending.abort(e).await),
        };

        let chunks = ChunkBuffer::default();
        {
            let mut inner = self.inner.lock().await;
            inner
                .lifecycle
                .acquired()
                .map_err(|e| CaptureError::NotRecording(e.current_state))?;

            let Some(stream) = pending.disarm() else {
                return Err(CaptureError::NotRecording(CaptureState::Recording));
            };
            let collector = tokio::spawn(collect(
                events,
                Arc::clone(&chunks),
                Arc::downgrade(&self.inner),
                Arc::clone(store),
                self.events.clone(),
                name.clone(),
            ));
            inner.session = Some(CaptureSession {
                name: name.clone(),
                stream,
                mime_type,
                chunks,
                collector,
            });
        }

        info!(name = %name, mime = %mime_type, "Recording started");
        let _ = self.events.send(CaptureEvent::Started { name });
        Ok(record)
    }

    /// Stop the recorder, assemble the buffered chunks and write them to
    /// `<name>.webm`.
    ///
    /// On success the controller stays in `Finalizing` until [`finish`] is
    /// called. On write failure it moves to `Failed` and the placeholder
    /// record stays in the store without audio. A device failure while
    /// recording has already removed the placeholder; stopping then releases
    /// the stream and reports the device error.
    ///
    /// [`finish`]: CaptureController::finish
    pub async fn stop(&self, files: &dyn FileStore) -> Result<PersistedCapture, CaptureError> {
        let session = {
            let mut inner = self.inner.lock().await;
            match inner.lifecycle.state() {
                CaptureState::Recording => {
                    inner
                        .lifecycle
                        .begin_finalize()
                        .map_err(|e| CaptureError::NotRecording(e.current_state))?;
                    match inner.session.take() {
                        Some(session) => session,
                        None => {
                            let _ = inner.lifecycle.fail();
                            return Err(CaptureError::NotRecording(CaptureState::Recording));
                        }
                    }
                }
                CaptureState::Failed if inner.session.is_some() => {
                    // The device failed mid-stream; release it and report why
                    let error = inner.last_error.take().unwrap_or(DeviceError::TrackEnded);
                    let session = inner.session.take();
                    drop(inner);
                    if let Some(session) = session {
                        Self::release(session).await;
                    }
                    return Err(CaptureError::Device(error));
                }
                other => return Err(CaptureError::NotRecording(other)),
            }
        };

        let CaptureSession {
            name,
            mut stream,
            mime_type,
            chunks,
            collector,
        } = session;

        info!(name = %name, "Stopping recording");
        if let Err(e) = stream.stop().await {
            warn!(name = %name, error = %e, "Recorder did not stop cleanly");
        }

        let outcome = match collector.await {
            Ok(outcome) => outcome,
            Err(e) => Err(DeviceError::StreamFailed(e.to_string())),
        };
        if let Err(e) = outcome {
            self.mark_failed(Some(&name), e.to_string()).await;
            return Err(e.into());
        }

        let buffered = std::mem::take(&mut *lock_chunks(&chunks));
        debug!(name = %name, chunks = buffered.len(), "Assembling payload");
        let payload = AudioPayload::from_chunks(buffered, mime_type);
        if payload.is_empty() {
            warn!(name = %name, "Recorder delivered no audio data");
        }

        let file_name = file_name_for(&name);
        if let Err(source) = files.write(&file_name, payload.data()).await {
            error!(
                name = %name,
                error = %source,
                "Failed to write recording; its metadata record is left without audio"
            );
            self.mark_failed(Some(&name), source.to_string()).await;
            return Err(CaptureError::Persistence { name, source });
        }

        info!(name = %name, size = %payload.human_readable_size(), "Recording written");
        Ok(PersistedCapture {
            path: files.resolve(&file_name),
            file_name,
            name,
            size_bytes: payload.size_bytes(),
        })
    }

    /// Complete a finalized capture and return to `Idle`
    pub async fn finish(&self, persisted: &PersistedCapture) -> Result<(), CaptureError> {
        self.inner
            .lock()
            .await
            .lifecycle
            .finalized()
            .map_err(|e| CaptureError::NotRecording(e.current_state))?;

        let _ = self.events.send(CaptureEvent::Persisted {
            name: persisted.name.clone(),
            size_bytes: persisted.size_bytes,
        });
        Ok(())
    }

    async fn mark_failed(&self, name: Option<&str>, reason: String) {
        fail_lifecycle(&self.inner, &self.events, name, reason).await;
    }

    async fn release(mut session: CaptureSession) {
        if let Err(e) = session.stream.stop().await {
            warn!(name = %session.name, error = %e, "Failed to release audio stream");
        }
        session.collector.abort();
        lock_chunks(&session.chunks).clear();
    }
}

/// Move an active lifecycle to `Failed` and announce it
async fn fail_lifecycle(
    inner: &Mutex<ControllerInner>,
    events: &broadcast::Sender<CaptureEvent>,
    name: Option<&str>,
    reason: String,
) {
    let mut inner = inner.lock().await;
    if inner.lifecycle.fail().is_err() {
        return;
    }
    error!(name = ?name, error = %reason, "Capture failed");
    let _ = events.send(CaptureEvent::Failed {
        name: name.map(str::to_string),
        error: reason,
    });
}

/// Remove a placeholder that will never get audio
async fn discard_placeholder(store: &MetadataStore, name: &str) {
    match store.remove(name).await {
        Ok(_) => debug!(name = %name, "Placeholder record removed"),
        Err(StoreError::NotFound(_)) => {}
        Err(e) => warn!(name = %name, error = %e, "Failed to remove placeholder record"),
    }
}

/// Resources held by a `start` that has not reached `Recording` yet.
///
/// Dropping it armed (the caller abandoned the future) releases them on a
/// spawned task.
struct PendingStart {
    inner: Arc<Mutex<ControllerInner>>,
    events: broadcast::Sender<CaptureEvent>,
    store: Arc<MetadataStore>,
    name: Option<String>,
    stream: Option<Box<dyn LiveStream>>,
    armed: bool,
}

impl PendingStart {
    /// Hand the stream over to the session
    fn disarm(&mut self) -> Option<Box<dyn LiveStream>> {
        self.armed = false;
        self.stream.take()
    }

    /// Release everything and fail the lifecycle, returning `error`
    async fn abort(mut self, error: impl Into<CaptureError>) -> CaptureError {
        let error = error.into();
        self.armed = false;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop().await {
                warn!(error = %e, "Failed to release audio stream");
            }
        }
        if let Some(name) = self.name.take() {
            discard_placeholder(&self.store, &name).await;
        }
        fail_lifecycle(&self.inner, &self.events, None, error.to_string()).await;
        error
    }
}

impl Drop for PendingStart {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let store = Arc::clone(&self.store);
        let name = self.name.take();
        let stream = self.stream.take();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Start abandoned outside a runtime; capture state not reset");
            return;
        };
        warn!(name = ?name, "Start abandoned before recording began");
        runtime.spawn(async move {
            if let Some(mut stream) = stream {
                if let Err(e) = stream.stop().await {
                    warn!(error = %e, "Failed to release audio stream");
                }
            }
            if let Some(name) = &name {
                discard_placeholder(&store, name).await;
            }
            fail_lifecycle(&inner, &events, None, "start was cancelled".to_string()).await;
        });
    }
}

/// Append recorder chunks in arrival order until the recorder stops or fails.
///
/// On failure the buffer is cleared and the placeholder record removed; a
/// failure while the session is still live also fails the lifecycle.
async fn collect(
    mut events: RecorderEvents,
    chunks: ChunkBuffer,
    controller: Weak<Mutex<ControllerInner>>,
    store: Arc<MetadataStore>,
    notify: broadcast::Sender<CaptureEvent>,
    name: String,
) -> Result<(), DeviceError> {
    let failure = loop {
        match events.recv().await {
            Some(RecorderEvent::Data(bytes)) => {
                if !bytes.is_empty() {
                    lock_chunks(&chunks).push(bytes);
                }
            }
            Some(RecorderEvent::Stopped) => return Ok(()),
            Some(RecorderEvent::Error(e)) => break e,
            None => break DeviceError::TrackEnded,
        }
    };

    lock_chunks(&chunks).clear();
    // Gone before the lifecycle leaves `Recording`, so observers of `Failed`
    // never see the record
    discard_placeholder(&store, &name).await;

    if let Some(inner) = controller.upgrade() {
        let mut inner = inner.lock().await;
        let is_current = inner.session.as_ref().is_some_and(|s| s.name == name);
        if is_current && inner.lifecycle.state() == CaptureState::Recording {
            let _ = inner.lifecycle.fail();
            inner.last_error = Some(failure.clone());
            error!(name = %name, error = %failure, "Audio device failed during recording");
            let _ = notify.send(CaptureEvent::Failed {
                name: Some(name),
                error: failure.to_string(),
            });
        }
    }

    Err(failure)
}
