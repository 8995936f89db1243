//! Schema descriptor value object

use std::fmt;

/// Primitive type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    String,
    Boolean,
}

impl FieldType {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single declared field of a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub primary: bool,
}

impl FieldDescriptor {
    /// Declare an optional field
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            primary: false,
        }
    }

    /// Declare a required field
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: true,
            ..Self::optional(name, field_type)
        }
    }

    /// Declare the primary key field. Primary keys are always required.
    pub fn primary(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            primary: true,
            ..Self::required(name, field_type)
        }
    }
}

/// Named, versioned declaration of the shape of a metadata record.
///
/// Title and description are informational only; the structural part is
/// the version plus the set of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub title: String,
    pub description: String,
    pub version: u32,
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    /// The schema every audio metadata record conforms to
    pub fn audio() -> Self {
        Self {
            title: "audio schema".to_string(),
            description: "describes a simple audio file".to_string(),
            version: 0,
            fields: vec![
                FieldDescriptor::primary("name", FieldType::String),
                FieldDescriptor::optional("description", FieldType::String),
                FieldDescriptor::required("createdAt", FieldType::String),
                FieldDescriptor::optional("isRecording", FieldType::Boolean),
            ],
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the primary key field, if one is declared
    pub fn primary_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.primary)
            .map(|f| f.name.as_str())
    }
}
