//! # Security Item Catalog Types
//!
//! The immutable catalog a Learning Session FSM walks. Items are supplied
//! by the caller; this crate only defines the shape.

use serde::{Deserialize, Serialize};

use crate::urn::Urn;

/// The kind of security knowledge item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityItemKind {
    Cve,
    Cwe,
    Capec,
    Attack,
    Other(String),
}

impl SecurityItemKind {
    /// The string tag used in cross-type ordering and urn construction.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cve => "cve",
            Self::Cwe => "cwe",
            Self::Capec => "capec",
            Self::Attack => "attack",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SecurityItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single catalog entry a learning session can present to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityItem {
    pub urn: Urn,
    pub kind: SecurityItemKind,
    pub id: String,
    pub title: String,
    pub source: String,
}
