//! Audio device capability port

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::recording::AudioMimeType;

/// Device acquisition and mid-stream errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Permission to use the microphone was denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    NoAudioDevice,

    #[error("Unsupported capture constraints: {0}")]
    Unsupported(String),

    #[error("Failed to start recorder: {0}")]
    StartFailed(String),

    #[error("Audio stream failed: {0}")]
    StreamFailed(String),

    #[error("Audio track ended unexpectedly")]
    TrackEnded,
}

/// What kind of stream is requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
}

impl CaptureConstraints {
    /// Microphone only, no camera
    pub const fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Events emitted by a running recorder, in capture order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A chunk of encoded audio
    Data(Vec<u8>),
    /// The device failed; no further data follows
    Error(DeviceError),
    /// Terminal event after a stop request; all data has been delivered
    Stopped,
}

/// Receiving end of a recorder's event sequence
pub type RecorderEvents = mpsc::UnboundedReceiver<RecorderEvent>;

/// Port for acquiring a live audio stream
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Request a live stream matching the constraints.
    ///
    /// May suspend while the user is asked for permission.
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn LiveStream>, DeviceError>;
}

/// A live stream plus its recorder
#[async_trait]
pub trait LiveStream: Send {
    /// Container type of the emitted chunks
    fn mime_type(&self) -> AudioMimeType;

    /// Start the recorder.
    ///
    /// May suspend until the hardware confirms the stream is running.
    ///
    /// # Returns
    /// The event sequence. Chunks arrive in capture order and the sequence
    /// ends with `Stopped` after `stop` is called, or with `Error`.
    async fn start(&mut self) -> Result<RecorderEvents, DeviceError>;

    /// Stop the recorder and release every track of the stream.
    async fn stop(&mut self) -> Result<(), DeviceError>;
}
