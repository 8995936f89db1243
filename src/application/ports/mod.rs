//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod config;
pub mod device;
pub mod file_store;
pub mod state;
pub mod store_backend;

// Re-export common types
pub use config::ConfigStore;
pub use device::{
    AudioDevice, CaptureConstraints, DeviceError, LiveStream, RecorderEvent, RecorderEvents,
};
pub use file_store::{FileError, FileStore};
pub use state::{StateError, StateStore};
pub use store_backend::{BackendError, StoreBackend};
