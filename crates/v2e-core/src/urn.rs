//! # Urn — Opaque Knowledge-Item Identifier
//!
//! Newtype wrapper for the `v2e::<type>::<id>` identifier form used to
//! name security items, memory records, and catalog links throughout the
//! workspace. Prevents passing a bare, unvalidated `String` wherever an
//! identifier is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated `v2e::<type>::<id>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

/// A `Urn` failed validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid urn {0:?}: expected form `v2e::<type>::<id>` with non-empty segments")]
pub struct UrnParseError(pub String);

impl Urn {
    /// Parse and validate a urn string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, UrnParseError> {
        let raw = raw.into();
        let segments: Vec<&str> = raw.split("::").collect();
        if segments.len() != 3
            || segments[0] != "v2e"
            || segments[1].is_empty()
            || segments[2].is_empty()
        {
            return Err(UrnParseError(raw));
        }
        Ok(Self(raw))
    }

    /// Build a urn from a type tag and an id, without re-validating the
    /// caller-supplied components beyond non-emptiness.
    pub fn new(kind: &str, id: &str) -> Result<Self, UrnParseError> {
        Self::parse(format!("v2e::{kind}::{id}"))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<type>` segment.
    pub fn kind(&self) -> &str {
        self.0.split("::").nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Urn {
    type Error = UrnParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
