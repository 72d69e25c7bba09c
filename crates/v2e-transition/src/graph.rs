//! # Graph FSM Transition Table
//!
//! States: `idle, building, analyzing, persisting, ready, error`.
//!
//! ```text
//! idle ──▶ building ──▶ {ready, error}
//! ready ──▶ {analyzing, persisting, building, idle}
//! analyzing ──▶ {ready, error}
//! persisting ──▶ {ready, error}
//! error ──▶ {idle, building}
//! ```

use serde::{Deserialize, Serialize};

/// The Graph FSM's state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphState {
    Idle,
    Building,
    Analyzing,
    Persisting,
    Ready,
    Error,
}

impl GraphState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Analyzing => "analyzing",
            Self::Persisting => "persisting",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "building" => Some(Self::Building),
            "analyzing" => Some(Self::Analyzing),
            "persisting" => Some(Self::Persisting),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn valid(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("idle", "building")
            | ("building", "ready")
            | ("building", "error")
            | ("ready", "analyzing")
            | ("ready", "persisting")
            | ("ready", "building")
            | ("ready", "idle")
            | ("analyzing", "ready")
            | ("analyzing", "error")
            | ("persisting", "ready")
            | ("persisting", "error")
            | ("error", "idle")
            | ("error", "building")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{valid as flavor_valid, Flavor};

    const ALL: [&str; 6] = ["idle", "building", "analyzing", "persisting", "ready", "error"];

    const ALLOWED: &[(&str, &str)] = &[
        ("idle", "building"),
        ("building", "ready"),
        ("building", "error"),
        ("ready", "analyzing"),
        ("ready", "persisting"),
        ("ready", "building"),
        ("ready", "idle"),
        ("analyzing", "ready"),
        ("analyzing", "error"),
        ("persisting", "ready"),
        ("persisting", "error"),
        ("error", "idle"),
        ("error", "building"),
    ];

    /// P1 — exhaustively check every ordered pair over the Graph state
    /// set against the allowed-set membership.
    #[test]
    fn exhaustive_pairs_match_allowed_set() {
        for &from in &ALL {
            for &to in &ALL {
                let expect = from == to || ALLOWED.contains(&(from, to));
                assert_eq!(
                    flavor_valid(Flavor::Graph, from, to),
                    expect,
                    "mismatch for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn display_and_parse_round_trip() {
        for &s in &ALL {
            let state = GraphState::parse(s).unwrap();
            assert_eq!(state.to_string(), s);
        }
    }
}
