//! # Memory FSM Transition Table
//!
//! States: `draft, new, learning, reviewed, learned, mastered, archived`.
//!
//! ```text
//! draft ──▶ {learned, archived}
//! new ──▶ {learning, archived}
//! learning ──▶ {reviewed, mastered, archived}
//! reviewed ──▶ {learning, mastered, archived}
//! learned ──▶ {learned, archived}
//! mastered ──▶ archived
//! archived ──▶ ∅
//! ```
//!
//! `learned -> learned` is a deliberate self-loop (not merely the generic
//! same-state allowance): it lets a caller re-record an edit to an
//! already-learned item without losing `learned` status. See the crate
//! root and `spec.md` §9 for why this is preserved rather than collapsed.

use serde::{Deserialize, Serialize};

/// The Memory FSM's state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryState {
    Draft,
    New,
    Learning,
    Reviewed,
    Learned,
    Mastered,
    Archived,
}

impl MemoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::New => "new",
            Self::Learning => "learning",
            Self::Reviewed => "reviewed",
            Self::Learned => "learned",
            Self::Mastered => "mastered",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "reviewed" => Some(Self::Reviewed),
            "learned" => Some(Self::Learned),
            "mastered" => Some(Self::Mastered),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn valid(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("draft", "learned")
            | ("draft", "archived")
            | ("new", "learning")
            | ("new", "archived")
            | ("learning", "reviewed")
            | ("learning", "mastered")
            | ("learning", "archived")
            | ("reviewed", "learning")
            | ("reviewed", "mastered")
            | ("reviewed", "archived")
            | ("learned", "archived")
            | ("mastered", "archived")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{valid as flavor_valid, Flavor};

    const ALL: [&str; 7] = [
        "draft",
        "new",
        "learning",
        "reviewed",
        "learned",
        "mastered",
        "archived",
    ];

    const ALLOWED: &[(&str, &str)] = &[
        ("draft", "learned"),
        ("draft", "archived"),
        ("new", "learning"),
        ("new", "archived"),
        ("learning", "reviewed"),
        ("learning", "mastered"),
        ("learning", "archived"),
        ("reviewed", "learning"),
        ("reviewed", "mastered"),
        ("reviewed", "archived"),
        ("learned", "archived"),
        ("mastered", "archived"),
    ];

    #[test]
    fn exhaustive_pairs_match_allowed_set() {
        for &from in &ALL {
            for &to in &ALL {
                let expect = from == to || ALLOWED.contains(&(from, to));
                assert_eq!(
                    flavor_valid(Flavor::Memory, from, to),
                    expect,
                    "mismatch for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn archived_accepts_no_outgoing_transition_but_itself() {
        for &to in &ALL {
            let expect = to == "archived";
            assert_eq!(flavor_valid(Flavor::Memory, "archived", to), expect);
        }
    }

    #[test]
    fn learned_self_loop_is_allowed() {
        assert!(flavor_valid(Flavor::Memory, "learned", "learned"));
    }
}
