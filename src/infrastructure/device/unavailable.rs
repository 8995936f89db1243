//! Placeholder device for builds or commands without a microphone

use async_trait::async_trait;

use crate::application::ports::{AudioDevice, CaptureConstraints, DeviceError, LiveStream};

/// Device that refuses every acquisition with `NoAudioDevice`
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDevice;

#[async_trait]
impl AudioDevice for UnavailableDevice {
    async fn acquire(
        &self,
        _constraints: CaptureConstraints,
    ) -> Result<Box<dyn LiveStream>, DeviceError> {
        Err(DeviceError::NoAudioDevice)
    }
}
