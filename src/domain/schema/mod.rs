//! Schema registry domain
//!
//! Declares the shape of metadata records and fingerprints it so that
//! schema drift can be detected across process restarts.

mod descriptor;
mod fingerprint;
mod policy;

pub use descriptor::{FieldDescriptor, FieldType, SchemaDescriptor};
pub use fingerprint::{has_schema_changed, FingerprintParseError, SchemaDrift, SchemaFingerprint};
pub use policy::{ConflictPolicy, ConflictPolicyParseError};
