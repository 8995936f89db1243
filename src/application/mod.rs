//! Application layer - Use cases and port interfaces
//!
//! Contains the core operations and trait definitions
//! for external system interactions.

pub mod capture;
pub mod context;
pub mod coordinator;
pub mod ports;
pub mod schema_registry;
pub mod store;

pub use capture::{CaptureController, CaptureError, CaptureEvent, PersistedCapture};
pub use context::AppContext;
pub use coordinator::{
    AuditReport, CoordinatorConfig, CoordinatorError, DeleteOutcome, RecordingCoordinator,
    StopOutcome,
};
pub use schema_registry::{SchemaRegistry, LAST_SCHEMA_HASH_KEY};
pub use store::{namespace_for, LiveQuery, MetadataStore, Snapshot, StoreError};
