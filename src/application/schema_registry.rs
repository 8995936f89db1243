//! Schema registry use case

use tracing::{info, warn};

use crate::domain::schema::{SchemaDescriptor, SchemaDrift, SchemaFingerprint};

use super::ports::StateStore;

/// Process-wide state key holding the last observed schema fingerprint
pub const LAST_SCHEMA_HASH_KEY: &str = "lastSchemaHash";

/// Owns the active schema and its fingerprint
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    descriptor: SchemaDescriptor,
    fingerprint: SchemaFingerprint,
}

impl SchemaRegistry {
    /// Create a registry for a descriptor
    pub fn new(descriptor: SchemaDescriptor) -> Self {
        let fingerprint = SchemaFingerprint::of(&descriptor);
        Self {
            descriptor,
            fingerprint,
        }
    }

    /// Registry for the audio metadata schema
    pub fn audio() -> Self {
        Self::new(SchemaDescriptor::audio())
    }

    /// The active schema
    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    /// Fingerprint of the active schema
    pub fn fingerprint(&self) -> SchemaFingerprint {
        self.fingerprint
    }

    /// Compare the active fingerprint with the persisted one and record the
    /// active one.
    ///
    /// Never fails: state I/O problems are logged and treated as a first run.
    pub async fn check_drift(&self, state: &dyn StateStore) -> SchemaDrift {
        let stored = match state.get(LAST_SCHEMA_HASH_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read last schema fingerprint");
                None
            }
        };

        let drift = SchemaDrift::detect(stored.as_deref(), self.fingerprint);
        match drift {
            SchemaDrift::Unchanged => {}
            SchemaDrift::FirstRun => {
                info!(fingerprint = %self.fingerprint, "No schema fingerprint recorded yet");
            }
            SchemaDrift::Changed { previous } => {
                warn!(
                    previous = ?previous.map(|p| p.to_string()),
                    current = %self.fingerprint,
                    "Schema changed: records stored under the previous schema are abandoned"
                );
            }
        }

        if drift.needs_update() {
            if let Err(e) = state
                .set(LAST_SCHEMA_HASH_KEY, &self.fingerprint.to_string())
                .await
            {
                warn!(error = %e, "Could not persist schema fingerprint");
            }
        }

        drift
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::audio()
    }
}
