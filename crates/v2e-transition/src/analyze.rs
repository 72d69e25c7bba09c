//! # Analyze Coordinator FSM Transition Table
//!
//! States: `bootstrapping, idle, processing, paused, draining, terminated`.
//!
//! ```text
//! bootstrapping ──▶ {idle, terminated}
//! idle ──▶ {processing, paused, draining}
//! processing ──▶ {idle, paused, draining}
//! paused ──▶ {idle, processing, draining}
//! draining ──▶ terminated
//! ```

use serde::{Deserialize, Serialize};

/// The Analyze Coordinator FSM's state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeState {
    Bootstrapping,
    Idle,
    Processing,
    Paused,
    Draining,
    Terminated,
}

impl AnalyzeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Paused => "paused",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bootstrapping" => Some(Self::Bootstrapping),
            "idle" => Some(Self::Idle),
            "processing" => Some(Self::Processing),
            "paused" => Some(Self::Paused),
            "draining" => Some(Self::Draining),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalyzeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn valid(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("bootstrapping", "idle")
            | ("bootstrapping", "terminated")
            | ("idle", "processing")
            | ("idle", "paused")
            | ("idle", "draining")
            | ("processing", "idle")
            | ("processing", "paused")
            | ("processing", "draining")
            | ("paused", "idle")
            | ("paused", "processing")
            | ("paused", "draining")
            | ("draining", "terminated")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{valid as flavor_valid, Flavor};

    const ALL: [&str; 6] = [
        "bootstrapping",
        "idle",
        "processing",
        "paused",
        "draining",
        "terminated",
    ];

    const ALLOWED: &[(&str, &str)] = &[
        ("bootstrapping", "idle"),
        ("bootstrapping", "terminated"),
        ("idle", "processing"),
        ("idle", "paused"),
        ("idle", "draining"),
        ("processing", "idle"),
        ("processing", "paused"),
        ("processing", "draining"),
        ("paused", "idle"),
        ("paused", "processing"),
        ("paused", "draining"),
        ("draining", "terminated"),
    ];

    #[test]
    fn exhaustive_pairs_match_allowed_set() {
        for &from in &ALL {
            for &to in &ALL {
                let expect = from == to || ALLOWED.contains(&(from, to));
                assert_eq!(
                    flavor_valid(Flavor::Analyze, from, to),
                    expect,
                    "mismatch for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminated_is_a_dead_end() {
        for &to in &ALL {
            if to != "terminated" {
                assert!(!flavor_valid(Flavor::Analyze, "terminated", to));
            }
        }
    }
}
