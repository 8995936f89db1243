//! Channel-fed audio device
//!
//! A device whose chunks are pushed by the host through a [`ChannelFeed`]
//! instead of coming from hardware. Used to import existing audio through
//! the capture pipeline and to drive captures from embedding hosts.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::application::ports::{
    AudioDevice, CaptureConstraints, DeviceError, LiveStream, RecorderEvent, RecorderEvents,
};
use crate::domain::recording::AudioMimeType;

#[derive(Default)]
struct FeedState {
    sender: Option<mpsc::UnboundedSender<RecorderEvent>>,
    deny_next: Option<DeviceError>,
    fail_next_start: Option<DeviceError>,
    gate: Option<oneshot::Receiver<()>>,
    chunks_sent: usize,
}

type Shared = Arc<Mutex<FeedState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Audio device fed through a [`ChannelFeed`]
pub struct ChannelDevice {
    state: Shared,
}

/// Host side of a [`ChannelDevice`]
#[derive(Clone)]
pub struct ChannelFeed {
    state: Shared,
}

impl ChannelDevice {
    /// Create a WebM device and its feed
    pub fn new() -> (Self, ChannelFeed) {
        let state = Shared::default();
        let feed = ChannelFeed {
            state: Arc::clone(&state),
        };
        (Self { state }, feed)
    }
}

#[async_trait]
impl AudioDevice for ChannelDevice {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn LiveStream>, DeviceError> {
        if !constraints.audio {
            return Err(DeviceError::Unsupported("audio track required".to_string()));
        }

        let (denied, gate) = {
            let mut state = lock(&self.state);
            (state.deny_next.take(), state.gate.take())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = denied {
            return Err(error);
        }

        Ok(Box::new(ChannelStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ChannelStream {
    state: Shared,
}

#[async_trait]
impl LiveStream for ChannelStream {
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Webm
    }

    async fn start(&mut self) -> Result<RecorderEvents, DeviceError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.fail_next_start.take() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.sender = Some(tx);
        state.chunks_sent = 0;
        debug!("Channel recorder started");
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(tx) = lock(&self.state).sender.take() {
            let _ = tx.send(RecorderEvent::Stopped);
        }
        Ok(())
    }
}

impl ChannelFeed {
    /// Deliver one chunk; returns false when no recorder is running
    pub fn push(&self, bytes: impl Into<Vec<u8>>) -> bool {
        let mut state = lock(&self.state);
        let sent = state
            .sender
            .as_ref()
            .is_some_and(|tx| tx.send(RecorderEvent::Data(bytes.into())).is_ok());
        if sent {
            state.chunks_sent += 1;
        }
        sent
    }

    /// Report a recorder error and end the running session
    pub fn fail(&self, error: DeviceError) -> bool {
        lock(&self.state)
            .sender
            .take()
            .is_some_and(|tx| tx.send(RecorderEvent::Error(error)).is_ok())
    }

    /// End the track without a stop request
    pub fn end_track(&self) -> bool {
        lock(&self.state).sender.take().is_some()
    }

    /// Make the next acquisition fail
    pub fn deny_next(&self, error: DeviceError) {
        lock(&self.state).deny_next = Some(error);
    }

    /// Make the next recorder start fail
    pub fn fail_next_start(&self, error: DeviceError) {
        lock(&self.state).fail_next_start = Some(error);
    }

    /// Hold the next acquisition until the returned sender fires or drops
    pub fn hold_next_acquire(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.state).gate = Some(rx);
        tx
    }

    /// Whether a recorder is running
    pub fn is_recording(&self) -> bool {
        lock(&self.state).sender.is_some()
    }

    /// Chunks delivered since the recorder started
    pub fn chunks_sent(&self) -> usize {
        lock(&self.state).chunks_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushes_arrive_in_order_then_stopped() {
        let (device, feed) = ChannelDevice::new();
        let mut stream = device
            .acquire(CaptureConstraints::audio_only())
            .await
            .unwrap();
        assert!(!feed.push(vec![0]));

        let mut events = stream.start().await.unwrap();
        assert!(feed.push(vec![1]));
        assert!(feed.push(vec![2]));
        stream.stop().await.unwrap();

        assert_eq!(events.recv().await, Some(RecorderEvent::Data(vec![1])));
        assert_eq!(events.recv().await, Some(RecorderEvent::Data(vec![2])));
        assert_eq!(events.recv().await, Some(RecorderEvent::Stopped));
        assert_eq!(events.recv().await, None);
        assert_eq!(feed.chunks_sent(), 2);
        assert_eq!(stream.mime_type(), AudioMimeType::Webm);
    }

    #[tokio::test]
    async fn denied_acquire_applies_once() {
        let (device, feed) = ChannelDevice::new();
        feed.deny_next(DeviceError::PermissionDenied);

        assert!(matches!(
            device.acquire(CaptureConstraints::audio_only()).await,
            Err(DeviceError::PermissionDenied)
        ));
        assert!(device
            .acquire(CaptureConstraints::audio_only())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn video_only_is_unsupported() {
        let (device, _feed) = ChannelDevice::new();
        let constraints = CaptureConstraints {
            audio: false,
            video: true,
        };
        assert!(matches!(
            device.acquire(constraints).await,
            Err(DeviceError::Unsupported(_))
        ));
    }
}
