//! Metadata record entity and query ordering

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::payload::AudioMimeType;

/// Durable descriptor of one recording, independent of its audio bytes.
///
/// `name` is the primary key and also the stem of the paired audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetadataRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recording: Option<bool>,
}

/// Error when a record does not satisfy the audio schema
#[derive(Debug, Clone, Error)]
pub enum InvalidRecord {
    #[error("Record name must not be empty")]
    EmptyName,

    #[error("Record name \"{0}\" contains a path separator")]
    PathInName(String),

    #[error("Record \"{0}\" is missing required field createdAt")]
    MissingCreatedAt(String),
}

impl MetadataRecord {
    /// Create a record for a capture that is still in progress
    pub fn recording(
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created_at: created_at.into(),
            is_recording: Some(true),
        }
    }

    /// Whether the record still carries the in-progress flag
    pub fn is_recording(&self) -> bool {
        self.is_recording.unwrap_or(false)
    }

    /// Copy of this record with the in-progress flag cleared
    pub fn completed(&self) -> Self {
        Self {
            is_recording: Some(false),
            ..self.clone()
        }
    }

    /// File name of the paired audio blob (`<name>.webm`)
    pub fn file_name(&self) -> String {
        file_name_for(&self.name)
    }

    /// Check the record against the audio schema
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.name.trim().is_empty() {
            return Err(InvalidRecord::EmptyName);
        }
        if self.name.contains('/') || self.name.contains('\\') {
            return Err(InvalidRecord::PathInName(self.name.clone()));
        }
        if self.created_at.trim().is_empty() {
            return Err(InvalidRecord::MissingCreatedAt(self.name.clone()));
        }
        Ok(())
    }
}

/// File name under the audio root for a record name
pub fn file_name_for(name: &str) -> String {
    format!("{}.{}", name, AudioMimeType::Webm.extension())
}

/// Record name for a file name under the audio root, if it follows the
/// `<name>.webm` convention
pub fn name_from_file(file_name: &str) -> Option<&str> {
    let suffix = format!(".{}", AudioMimeType::Webm.extension());
    file_name
        .strip_suffix(suffix.as_str())
        .filter(|stem| !stem.is_empty())
}

/// Error when parsing a sort key
#[derive(Debug, Clone, Error)]
#[error("Invalid sort key: \"{input}\". Valid keys are: name, createdAt, description")]
pub struct SortKeyParseError {
    pub input: String,
}

/// Field a query result is sorted by (always ascending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Name,
    CreatedAt,
    Description,
}

impl SortKey {
    /// Get the schema field name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "createdAt",
            Self::Description => "description",
        }
    }

    /// Total order over records: by the key, ties broken by name
    pub fn compare(&self, a: &MetadataRecord, b: &MetadataRecord) -> Ordering {
        let primary = match self {
            Self::Name => Ordering::Equal,
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Description => a.description.cmp(&b.description),
        };
        primary.then_with(|| a.name.cmp(&b.name))
    }

    /// Sort records in place
    pub fn sort(&self, records: &mut [MetadataRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name" => Ok(Self::Name),
            "createdAt" | "created_at" | "created-at" => Ok(Self::CreatedAt),
            "description" => Ok(Self::Description),
            _ => Err(SortKeyParseError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, created_at: &str) -> MetadataRecord {
        MetadataRecord::recording(name, "", created_at)
    }

    #[test]
    fn recording_record_has_flag_set() {
        let r = record("abc", "2024-01-01T00:00:00Z");
        assert!(r.is_recording());
        assert!(!r.completed().is_recording());
        assert_eq!(r.completed().is_recording, Some(false));
    }

    #[test]
    fn file_name_uses_webm_extension() {
        assert_eq!(record("abc", "t").file_name(), "abc.webm");
        assert_eq!(file_name_for("x-y"), "x-y.webm");
    }

    #[test]
    fn name_from_file_strips_extension() {
        assert_eq!(name_from_file("abc.webm"), Some("abc"));
        assert_eq!(name_from_file("abc.wav"), None);
        assert_eq!(name_from_file(".webm"), None);
    }

    #[test]
    fn validate_rejects_bad_records() {
        assert!(record("abc", "t").validate().is_ok());
        assert!(matches!(
            record("", "t").validate(),
            Err(InvalidRecord::EmptyName)
        ));
        assert!(matches!(
            record("../etc", "t").validate(),
            Err(InvalidRecord::PathInName(_))
        ));
        assert!(matches!(
            record("abc", " ").validate(),
            Err(InvalidRecord::MissingCreatedAt(_))
        ));
    }

    #[test]
    fn serializes_with_schema_field_names() {
        let json = serde_json::to_value(record("abc", "t")).unwrap();
        assert_eq!(json["name"], "abc");
        assert_eq!(json["createdAt"], "t");
        assert_eq!(json["isRecording"], true);
    }

    #[test]
    fn absent_flag_is_omitted() {
        let mut r = record("abc", "t");
        r.is_recording = None;
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("isRecording"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{"name":"a","createdAt":"t","durationMs":10}"#;
        assert!(serde_json::from_str::<MetadataRecord>(json).is_err());
    }

    #[test]
    fn missing_created_at_is_rejected() {
        let json = r#"{"name":"a"}"#;
        assert!(serde_json::from_str::<MetadataRecord>(json).is_err());
    }

    #[test]
    fn sort_by_created_at_breaks_ties_by_name() {
        let mut records = vec![record("b", "1"), record("a", "2"), record("a0", "1")];
        SortKey::CreatedAt.sort(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a0", "b", "a"]);
    }

    #[test]
    fn sort_key_parse() {
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!("created-at".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert_eq!("createdAt".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert!("size".parse::<SortKey>().is_err());
    }
}
