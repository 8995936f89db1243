//! What to do when persisted data no longer matches the schema

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error when parsing a conflict policy
#[derive(Debug, Clone, Error)]
#[error("Invalid schema conflict policy: \"{input}\". Valid policies are: rebuild, fail")]
pub struct ConflictPolicyParseError {
    pub input: String,
}

/// Policy applied when a store namespace cannot be opened under the
/// current schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConflictPolicy {
    /// Destroy the namespace and start over with an empty store
    #[default]
    Rebuild,
    /// Surface the conflict to the caller and leave the data untouched
    Fail,
}

impl ConflictPolicy {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rebuild => "rebuild",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConflictPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rebuild" => Ok(Self::Rebuild),
            "fail" => Ok(Self::Fail),
            _ => Err(ConflictPolicyParseError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_rebuild() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Rebuild);
    }

    #[test]
    fn parse() {
        assert_eq!("rebuild".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Rebuild);
        assert_eq!("FAIL".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Fail);
        assert!("migrate".parse::<ConflictPolicy>().is_err());
    }
}
