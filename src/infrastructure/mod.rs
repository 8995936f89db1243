//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with the filesystem and audio hardware.

pub mod config;
pub mod device;
pub mod metadata;
pub mod state;
pub mod storage;

// Re-export adapters
pub use config::XdgConfigStore;
#[cfg(feature = "cpal")]
pub use device::CpalMicrophone;
pub use device::{ChannelDevice, ChannelFeed, UnavailableDevice};
pub use metadata::{JsonFileBackend, MemoryStoreBackend};
pub use state::JsonStateStore;
pub use storage::AudioDirectory;
