//! Data types owned by the Graph FSM: transition history entries,
//! rollback snapshots, lifecycle events, and the retry policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use v2e_core::Timestamp;
pub use v2e_core::RetryPolicy;

/// One attempted transition, successful or not. Oldest-first in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from_state: String,
    pub to_state: String,
    pub timestamp: Timestamp,
    pub success: bool,
    pub duration: std::time::Duration,
    pub error_message: Option<String>,
}

/// A captured `(stateName, payload, sequenceID)` tuple, usable to restore
/// state on handler failure or explicit rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub state_name: String,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
    pub sequence_id: u64,
}

/// A lifecycle event bubbled to the registered handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLifecycleEvent {
    pub event_type: GraphEventType,
    pub timestamp: Timestamp,
    pub payload: HashMap<String, serde_json::Value>,
}

impl GraphLifecycleEvent {
    pub fn new(event_type: GraphEventType) -> Self {
        Self {
            event_type,
            timestamp: Timestamp::now(),
            payload: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

/// The kind of lifecycle event a Graph FSM can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventType {
    BuildStarted,
    BuildCompleted,
    BuildFailed,
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
    PersistStarted,
    PersistCompleted,
    PersistFailed,
    Cleared,
    Paused,
    Resumed,
    ResourceConstrained,
}

/// A snapshot of the FSM's public-facing state, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub current_state: String,
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub last_operation: Option<String>,
    pub last_failed_state: Option<String>,
    pub can_recover: bool,
    pub history_len: usize,
    pub failed_transition_count: usize,
    pub retry_policy: RetryPolicy,
}
