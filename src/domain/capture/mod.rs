//! Capture domain

mod state;

pub use state::{CaptureLifecycle, CaptureState, InvalidStateTransition};
