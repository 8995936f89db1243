//! Audio device adapters

mod channel;
#[cfg(feature = "cpal")]
mod cpal_device;
mod unavailable;
pub mod webm;

pub use channel::{ChannelDevice, ChannelFeed};
#[cfg(feature = "cpal")]
pub use cpal_device::CpalMicrophone;
pub use unavailable::UnavailableDevice;
pub use webm::PcmWebmWriter;
