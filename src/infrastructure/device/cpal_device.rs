//! Microphone device using cpal
//!
//! Streams 16-bit PCM muxed into WebM clusters, one chunk per timeslice.
//! The stream is owned by a dedicated thread since cpal::Stream is not Send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::webm::PcmWebmWriter;
use crate::application::ports::{
    AudioDevice, CaptureConstraints, DeviceError, LiveStream, RecorderEvent, RecorderEvents,
};
use crate::domain::recording::AudioMimeType;

/// Interval between emitted chunks
const TIMESLICE: Duration = Duration::from_millis(250);

/// How long to wait for the capture thread to open the stream
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Default system microphone
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }

    fn input_device() -> Result<cpal::Device, DeviceError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(DeviceError::NoAudioDevice)
    }

    /// Pick an i16 or f32 configuration, preferring fewer channels
    fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| DeviceError::StartFailed(format!("Failed to get configs: {}", e)))?;

        let best = supported
            .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
            .min_by_key(|c| c.channels())
            .ok_or_else(|| DeviceError::StartFailed("No suitable config found".into()))?;

        let sample_format = best.sample_format();
        let config = best.with_max_sample_rate().config();
        Ok((config, sample_format))
    }
}

#[async_trait]
impl AudioDevice for CpalMicrophone {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn LiveStream>, DeviceError> {
        if !constraints.audio || constraints.video {
            return Err(DeviceError::Unsupported(
                "only audio-only capture is available".to_string(),
            ));
        }

        let (config, sample_format) = tokio::task::spawn_blocking(|| {
            let device = Self::input_device()?;
            Self::input_config(&device)
        })
        .await
        .map_err(|e| DeviceError::StartFailed(format!("Task join error: {}", e)))??;

        debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Microphone acquired"
        );

        Ok(Box::new(CpalStream {
            config,
            sample_format,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }))
    }
}

struct CpalStream {
    config: StreamConfig,
    sample_format: SampleFormat,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

#[async_trait]
impl LiveStream for CpalStream {
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Webm
    }

    async fn start(&mut self) -> Result<RecorderEvents, DeviceError> {
        if self.thread.is_some() {
            return Err(DeviceError::StartFailed(
                "Recorder already started".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let config = self.config.clone();
        let sample_format = self.sample_format;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let handle = std::thread::spawn(move || {
            capture_thread(config, sample_format, running, tx, ready_tx);
        });

        let failure = match tokio::time::timeout(START_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                self.thread = Some(handle);
                return Ok(rx);
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(_)) => DeviceError::StartFailed("Capture thread exited early".to_string()),
            Err(_) => DeviceError::StartFailed("Timed out opening the microphone".to_string()),
        };
        self.running.store(false, Ordering::SeqCst);
        Err(failure)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| DeviceError::StreamFailed(format!("Task join error: {}", e)))?
                .map_err(|_| DeviceError::StreamFailed("Capture thread panicked".to_string()))?;
        }
        Ok(())
    }
}

/// Mix interleaved frames down to mono
fn to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

fn map_build_error(e: BuildStreamError) -> DeviceError {
    match e {
        BuildStreamError::DeviceNotAvailable => DeviceError::NoAudioDevice,
        other => DeviceError::StartFailed(other.to_string()),
    }
}

fn capture_thread(
    config: StreamConfig,
    sample_format: SampleFormat,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<RecorderEvent>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
) {
    let buffer: Arc<StdMutex<Vec<i16>>> = Arc::default();
    let failure: Arc<StdMutex<Option<String>>> = Arc::default();
    let channels = config.channels;

    let stream = CpalMicrophone::input_device().and_then(|device| {
        let on_error = {
            let failure = Arc::clone(&failure);
            move |err: cpal::StreamError| {
                if let Ok(mut slot) = failure.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            }
        };

        let sink = Arc::clone(&buffer);
        let built = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buffer) = sink.lock() {
                        buffer.extend_from_slice(&to_mono(data, channels));
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data.iter().map(|&s| (s * 32767.0) as i16).collect();
                    if let Ok(mut buffer) = sink.lock() {
                        buffer.extend_from_slice(&to_mono(&converted, channels));
                    }
                },
                on_error,
                None,
            ),
            _ => return Err(DeviceError::Unsupported("sample format".to_string())),
        };
        built.map_err(map_build_error)
    });

    let stream = match stream.and_then(|s| {
        s.play()
            .map_err(|e| DeviceError::StartFailed(e.to_string()))
            .map(|()| s)
    }) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut writer = PcmWebmWriter::new(config.sample_rate.0, 1);
    if events.send(RecorderEvent::Data(writer.header())).is_err() {
        return;
    }

    let drain = |writer: &mut PcmWebmWriter| -> Option<Vec<u8>> {
        let samples = buffer
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .unwrap_or_default();
        (!samples.is_empty()).then(|| writer.cluster(&samples))
    };

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(TIMESLICE);

        let failed = failure.lock().ok().and_then(|mut f| f.take());
        if let Some(message) = failed {
            error!(error = %message, "Microphone stream error");
            let _ = events.send(RecorderEvent::Error(DeviceError::StreamFailed(message)));
            return;
        }

        if let Some(cluster) = drain(&mut writer) {
            if events.send(RecorderEvent::Data(cluster)).is_err() {
                warn!("Chunk receiver dropped; stopping capture");
                return;
            }
        }
    }

    drop(stream);
    if let Some(cluster) = drain(&mut writer) {
        let _ = events.send(RecorderEvent::Data(cluster));
    }
    debug!(duration_ms = writer.position_ms(), "Microphone capture stopped");
    let _ = events.send(RecorderEvent::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_mono_single_channel() {
        let mono = vec![100i16, 200, 300];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn to_mono_averages_frames() {
        let stereo = vec![100i16, 200, 300, 400];
        assert_eq!(to_mono(&stereo, 2), vec![150, 350]);
    }

    #[tokio::test]
    async fn video_capture_is_unsupported() {
        let constraints = CaptureConstraints {
            audio: true,
            video: true,
        };
        assert!(matches!(
            CpalMicrophone::new().acquire(constraints).await,
            Err(DeviceError::Unsupported(_))
        ));
    }
}
