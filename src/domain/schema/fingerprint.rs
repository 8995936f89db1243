//! Schema fingerprinting and drift detection

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::descriptor::SchemaDescriptor;

/// Error when a persisted fingerprint is not a valid hex digest
#[derive(Debug, Clone, Error)]
#[error("Invalid schema fingerprint: \"{input}\". Expected 8 hex digits")]
pub struct FingerprintParseError {
    pub input: String,
}

/// Deterministic hash of a schema's structure.
///
/// Two descriptors with the same version and the same set of fields (name,
/// type, required, primary) share a fingerprint regardless of field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint(u32);

impl SchemaFingerprint {
    /// Compute the fingerprint of a descriptor
    pub fn of(descriptor: &SchemaDescriptor) -> Self {
        Self(crc32fast::hash(canonical_form(descriptor).as_bytes()))
    }

    /// Raw digest value
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for SchemaFingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 8 {
            return Err(FingerprintParseError {
                input: s.to_string(),
            });
        }
        u32::from_str_radix(trimmed, 16)
            .map(Self)
            .map_err(|_| FingerprintParseError {
                input: s.to_string(),
            })
    }
}

/// Result of comparing the current schema against the last one observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDrift {
    /// No fingerprint was persisted yet
    FirstRun,
    /// Persisted fingerprint matches
    Unchanged,
    /// Persisted fingerprint differs (or could not be parsed)
    Changed { previous: Option<SchemaFingerprint> },
}

impl SchemaDrift {
    /// Compare a persisted fingerprint string with the current fingerprint
    pub fn detect(stored: Option<&str>, current: SchemaFingerprint) -> Self {
        match stored {
            None => Self::FirstRun,
            Some(raw) => match raw.parse::<SchemaFingerprint>() {
                Ok(previous) if previous == current => Self::Unchanged,
                Ok(previous) => Self::Changed {
                    previous: Some(previous),
                },
                Err(_) => Self::Changed { previous: None },
            },
        }
    }

    /// Whether the persisted fingerprint has to be replaced
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Whether a stored fingerprint differs from the current one.
/// A missing stored value counts as a change.
pub fn has_schema_changed(stored: Option<&str>, current: SchemaFingerprint) -> bool {
    SchemaDrift::detect(stored, current).needs_update()
}

/// Order-independent textual form of the structural part of a descriptor
fn canonical_form(descriptor: &SchemaDescriptor) -> String {
    let mut fields: Vec<String> = descriptor
        .fields
        .iter()
        .map(|f| {
            format!(
                "{}:{}:{}:{}",
                f.name,
                f.field_type,
                if f.required { "required" } else { "optional" },
                if f.primary { "primary" } else { "-" }
            )
        })
        .collect();
    fields.sort();

    format!("v{}|{}", descriptor.version, fields.join(";"))
}
