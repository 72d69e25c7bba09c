//! # Persisted Record Shapes
//!
//! The on-disk shapes for the Memory FSM (C4) and Learning Session FSM
//! (C5) records, shared between the FSMs that produce them and the
//! persistence layer (`v2e-store`, C6) that stores and validates them.

use serde::{Deserialize, Serialize};

use crate::temporal::Timestamp;
use crate::urn::Urn;

/// One recorded transition of a `MemoryObjectState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    #[serde(rename = "from_state")]
    pub from: String,
    #[serde(rename = "to_state")]
    pub to: String,
    pub timestamp: Timestamp,
    pub reason: String,
    #[serde(rename = "user_id")]
    pub actor_id: Option<String>,
}

/// The full persisted record for one memory object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryObjectState {
    pub urn: Urn,
    #[serde(rename = "state")]
    pub current_state: String,
    #[serde(rename = "state_history")]
    pub history: Vec<StateHistoryEntry>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The full persisted record for the (singleton) learning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSessionState {
    #[serde(rename = "state")]
    pub session_state: String,
    pub current_strategy: String,
    pub current_item_urn: Option<Urn>,
    pub viewed_items: Vec<Urn>,
    pub completed_items: Vec<Urn>,
    pub path_stack: Vec<Urn>,
    pub session_start: Timestamp,
    pub last_activity: Timestamp,
    pub updated_at: Timestamp,
}

impl LearningSessionState {
    /// A fresh session: `idle`, strategy `"bfs"`, everything else empty.
    pub fn fresh() -> Self {
        let now = Timestamp::now();
        Self {
            session_state: "idle".to_string(),
            current_strategy: "bfs".to_string(),
            current_item_urn: None,
            viewed_items: Vec::new(),
            completed_items: Vec::new(),
            path_stack: Vec::new(),
            session_start: now,
            last_activity: now,
            updated_at: now,
        }
    }
}
