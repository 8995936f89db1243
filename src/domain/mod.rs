//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod recording;
pub mod schema;

// Re-export common types
pub use capture::{CaptureLifecycle, CaptureState};
pub use config::AppConfig;
pub use error::*;
pub use recording::{AudioMimeType, AudioPayload, MetadataRecord, SortKey};
pub use schema::{ConflictPolicy, SchemaDescriptor, SchemaDrift, SchemaFingerprint};
