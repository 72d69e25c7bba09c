//! # v2e-memory — Memory FSM (C4)
//!
//! A per-object state machine over `{draft, new, learning, reviewed,
//! learned, mastered, archived}`, driven by a caller-supplied
//! [`MemoryObject`]. Every transition is recorded in an append-only
//! history and persisted synchronously to `v2e-store` on success.

use std::sync::Arc;

use parking_lot::RwLock;
use v2e_core::{MemoryObjectState, StateHistoryEntry, StoreError, Timestamp, TransitionError, Urn};
use v2e_store::Store;
use v2e_transition::{Flavor, MemoryState};

/// The capability set a caller's domain object must expose so the Memory
/// FSM can drive it.
pub trait MemoryObject: Send + Sync {
    fn get_urn(&self) -> &Urn;
    fn get_memory_fsm_state(&self) -> MemoryState;
    /// Invoked after the FSM has committed `target` in-memory. An error
    /// here rolls the in-memory transition back (§4.4).
    fn set_memory_fsm_state(&self, target: MemoryState) -> Result<(), String>;
}

/// Combined error surface for a failed transition: either the transition
/// itself was rejected/rolled back, or it committed but persistence
/// failed (the documented non-atomicity — see crate docs).
#[derive(Debug, thiserror::Error)]
pub enum MemoryFsmError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the in-memory record and drives a [`MemoryObject`] through it.
pub struct MemoryFsm<O: MemoryObject> {
    object: Arc<O>,
    store: Arc<Store>,
    record: RwLock<MemoryObjectState>,
}

impl<O: MemoryObject> MemoryFsm<O> {
    /// Builds a fresh record for `object`, seeded from its current state.
    pub fn new(object: Arc<O>, store: Arc<Store>) -> Self {
        let now = Timestamp::now();
        let initial = object.get_memory_fsm_state();
        let record = MemoryObjectState {
            urn: object.get_urn().clone(),
            current_state: initial.to_string(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        Self {
            object,
            store,
            record: RwLock::new(record),
        }
    }

    /// Wraps an already-persisted record (the `LoadState` path).
    pub fn from_record(object: Arc<O>, store: Arc<Store>, record: MemoryObjectState) -> Self {
        Self {
            object,
            store,
            record: RwLock::new(record),
        }
    }

    fn current(&self) -> MemoryState {
        let state = self.record.read().current_state.clone();
        MemoryState::parse(&state).expect("persisted memory state is always one of the known set")
    }

    pub fn can_transition(&self, target: MemoryState) -> bool {
        v2e_transition::valid(Flavor::Memory, self.current().as_str(), target.as_str())
    }

    /// The transition protocol of §4.4: validate, record history, update
    /// in-memory state, invoke the object's setter (rolling back on
    /// failure), then persist synchronously on success.
    pub fn transition(
        &self,
        target: MemoryState,
        reason: impl Into<String>,
        actor_id: Option<impl Into<String>>,
    ) -> Result<(), MemoryFsmError> {
        let current = self.current();
        if !v2e_transition::valid(Flavor::Memory, current.as_str(), target.as_str()) {
            return Err(TransitionError::invalid(current.as_str(), target.as_str()).into());
        }

        let now = Timestamp::now();
        let entry = StateHistoryEntry {
            from: current.to_string(),
            to: target.to_string(),
            timestamp: now,
            reason: reason.into(),
            actor_id: actor_id.map(Into::into),
        };

        {
            let mut record = self.record.write();
            record.history.push(entry);
            record.current_state = target.to_string();
            record.updated_at = now;
        }

        if let Err(cause) = self.object.set_memory_fsm_state(target) {
            let mut record = self.record.write();
            record.current_state = current.to_string();
            record.history.pop();
            drop(record);
            tracing::error!(%cause, from = %current, to = %target, "SetMemoryFSMState failed, transition rolled back");
            return Err(TransitionError::handler_failed(current.as_str(), target.as_str(), cause).into());
        }

        let snapshot = self.record.read().clone();
        self.store.save_memory_fsm_state(&snapshot).map_err(|e| {
            tracing::warn!(
                error = %e,
                urn = %snapshot.urn,
                "persistence failed after in-memory transition committed; record now diverges from store"
            );
            e
        })?;
        Ok(())
    }

    pub fn get_state(&self) -> MemoryObjectState {
        self.record.read().clone()
    }

    pub fn get_state_value(&self) -> MemoryState {
        self.current()
    }

    pub fn get_history(&self) -> Vec<StateHistoryEntry> {
        self.record.read().history.clone()
    }

    /// Re-reads the record from persistence, replacing the in-memory copy.
    pub fn load_state(&self) -> Result<(), StoreError> {
        let loaded = self.store.load_memory_fsm_state(self.object.get_urn())?;
        *self.record.write() = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Recorder {
        urn: Urn,
        state: parking_lot::Mutex<MemoryState>,
        fail_next: AtomicBool,
    }

    impl Recorder {
        fn new(urn: Urn, state: MemoryState) -> Self {
            Self {
                urn,
                state: parking_lot::Mutex::new(state),
                fail_next: AtomicBool::new(false),
            }
        }
    }

    impl MemoryObject for Recorder {
        fn get_urn(&self) -> &Urn {
            &self.urn
        }

        fn get_memory_fsm_state(&self) -> MemoryState {
            *self.state.lock()
        }

        fn set_memory_fsm_state(&self, target: MemoryState) -> Result<(), String> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err("write conflict".to_string());
            }
            *self.state.lock() = target;
            Ok(())
        }
    }

    async fn store() -> (Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).await.unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn happy_path_transition_persists() {
        let (store, _dir) = store().await;
        let urn = Urn::new("cve", "2024-0100").unwrap();
        let object = Arc::new(Recorder::new(urn.clone(), MemoryState::New));
        let fsm = MemoryFsm::new(object, store.clone());

        fsm.transition(MemoryState::Learning, "started review", Some("alice")).unwrap();
        assert_eq!(fsm.get_state_value(), MemoryState::Learning);
        assert_eq!(fsm.get_history().len(), 1);

        let persisted = store.load_memory_fsm_state(&urn).unwrap();
        assert_eq!(persisted.current_state, "learning");
    }

    #[test]
    fn invalid_transition_is_rejected_without_mutation() {
        let object = Arc::new(Recorder::new(Urn::new("cve", "2024-0101").unwrap(), MemoryState::New));
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (store, _dir) = rt.block_on(store());
        let fsm = MemoryFsm::new(object, store);

        let err = fsm.transition(MemoryState::Mastered, "skip ahead", Some("bob")).unwrap_err();
        assert!(matches!(err, MemoryFsmError::Transition(_)));
        assert_eq!(fsm.get_state_value(), MemoryState::New);
        assert!(fsm.get_history().is_empty());
    }

    #[tokio::test]
    async fn setter_failure_rolls_back_state_and_history() {
        let (store, _dir) = store().await;
        let object = Arc::new(Recorder::new(Urn::new("cve", "2024-0102").unwrap(), MemoryState::New));
        object.fail_next.store(true, Ordering::SeqCst);
        let fsm = MemoryFsm::new(object, store);

        let err = fsm.transition(MemoryState::Learning, "attempt", Some("carol")).unwrap_err();
        assert!(matches!(err, MemoryFsmError::Transition(_)));
        assert_eq!(fsm.get_state_value(), MemoryState::New);
        assert!(fsm.get_history().is_empty());
    }

    #[tokio::test]
    async fn learned_self_loop_is_recorded() {
        let (store, _dir) = store().await;
        let object = Arc::new(Recorder::new(Urn::new("cve", "2024-0103").unwrap(), MemoryState::Learned));
        let fsm = MemoryFsm::new(object, store);

        fsm.transition(MemoryState::Learned, "re-edit", Some("dave")).unwrap();
        assert_eq!(fsm.get_history().len(), 1);
        assert_eq!(fsm.get_state_value(), MemoryState::Learned);
    }

    #[tokio::test]
    async fn can_transition_matches_the_validator() {
        let (store, _dir) = store().await;
        let object = Arc::new(Recorder::new(Urn::new("cve", "2024-0104").unwrap(), MemoryState::Mastered));
        let fsm = MemoryFsm::new(object, store);

        assert!(fsm.can_transition(MemoryState::Archived));
        assert!(!fsm.can_transition(MemoryState::Learning));
    }
}
