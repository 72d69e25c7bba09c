//! # v2e-graph — Graph FSM (C2)
//!
//! Supervises the lifecycle of a graph-processing engine: build → analyze
//! → persist → ready, with retry, rollback, snapshots, transition
//! history, and lifecycle events bubbled to a parent (the Analyze
//! Coordinator FSM in `v2e-analyze`).

mod fsm;
mod types;

pub use fsm::GraphFsm;
pub use types::{Diagnostics, GraphEventType, GraphLifecycleEvent, RetryPolicy, Snapshot, Transition};
pub use v2e_transition::GraphState;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scenario 1 — happy path build.
    #[test]
    fn happy_path_build() {
        let fsm = GraphFsm::new();
        assert_eq!(fsm.get_state(), GraphState::Idle);

        fsm.start_build().unwrap();
        assert_eq!(fsm.get_state(), GraphState::Building);

        fsm.complete_build().unwrap();
        assert_eq!(fsm.get_state(), GraphState::Ready);

        let history = fsm.get_transition_history(10);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|t| t.success));
    }

    /// Scenario 2 — failure and retry.
    #[tokio::test]
    async fn failure_and_retry() {
        let fsm = GraphFsm::new();
        fsm.start_build().unwrap();
        fsm.fail_build("net");
        assert_eq!(fsm.get_state(), GraphState::Error);

        let err = fsm.get_last_error().unwrap();
        assert!(!err.is_permanent());

        let diag = fsm.get_diagnostics();
        assert_eq!(diag.retry_count, 1);

        fsm.retry_failed_operation().await.unwrap();
        assert_eq!(fsm.get_state(), GraphState::Building);
    }

    /// Scenario 3 — invalid transition leaves state untouched and records
    /// a failed history entry.
    #[test]
    fn invalid_transition_is_rejected() {
        let fsm = GraphFsm::new();
        let err = fsm.transition(GraphState::Analyzing).unwrap_err();
        assert_eq!(fsm.get_state(), GraphState::Idle);
        assert_eq!(err.kind, v2e_core::TransitionErrorKind::InvalidTransition);

        let failed = fsm.get_failed_transitions();
        assert_eq!(failed.len(), 1);
    }

    /// P3 — rollback preserves state on handler failure.
    #[test]
    fn transition_with_handler_rolls_back_on_error() {
        let fsm = GraphFsm::new();
        fsm.start_build().unwrap();
        let before = fsm.get_state();

        let err = fsm
            .transition_with_handler(GraphState::Ready, || Err("disk full".to_string()))
            .unwrap_err();

        assert_eq!(fsm.get_state(), before);
        assert_eq!(err.kind, v2e_core::TransitionErrorKind::TransitionFailed);
        assert!(err.rolled_back);

        let last = fsm.get_transition_history(1);
        assert!(!last[0].success);
    }

    #[test]
    fn transition_with_handler_commits_on_success() {
        let fsm = GraphFsm::new();
        fsm.start_build().unwrap();
        fsm.transition_with_handler(GraphState::Ready, || Ok(())).unwrap();
        assert_eq!(fsm.get_state(), GraphState::Ready);
    }

    /// P4 — retry ceiling: after `maxRetries + 1` total failed attempts
    /// in a single streak (none of which successfully left `error`),
    /// `RetryFailedOperation` refuses with `RECOVERY_EXHAUSTED`.
    #[tokio::test(start_paused = true)]
    async fn retry_ceiling_is_enforced() {
        let fsm = GraphFsm::new();
        fsm.start_build().unwrap();
        for _ in 0..4 {
            fsm.fail_build("transient");
        }
        let err = fsm.retry_failed_operation().await.unwrap_err();
        assert_eq!(err.kind, v2e_core::TransitionErrorKind::RecoveryExhausted);
    }

    /// The counter resets once a retried attempt actually leaves `error`.
    #[tokio::test]
    async fn retry_counter_resets_after_leaving_error() {
        let fsm = GraphFsm::new();
        fsm.start_build().unwrap();
        fsm.fail_build("net");
        fsm.retry_failed_operation().await.unwrap();
        assert_eq!(fsm.get_state(), GraphState::Building);
        assert_eq!(fsm.get_diagnostics().retry_count, 0);
    }

    /// P5 — ring buffer cap for history.
    #[test]
    fn history_ring_is_capped() {
        let fsm = GraphFsm::with_capacity(RetryPolicy::default(), 3, 5);
        for _ in 0..10 {
            let _ = fsm.transition(GraphState::Analyzing);
        }
        assert!(fsm.get_transition_history(100).len() <= 3);
    }

    /// P8 — events are delivered in the same order verbs completed.
    #[test]
    fn events_delivered_in_order() {
        let fsm = GraphFsm::new();
        let log: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log2 = log.clone();
        fsm.set_event_handler(move |event| {
            log2.lock().unwrap().push(format!("{:?}", event.event_type));
        });

        fsm.start_build().unwrap();
        fsm.complete_build().unwrap();
        fsm.start_analysis().unwrap();
        fsm.complete_analysis().unwrap();

        let observed = log.lock().unwrap().clone();
        assert_eq!(
            observed,
            vec!["BuildStarted", "BuildCompleted", "AnalysisStarted", "AnalysisCompleted"]
        );
    }

    #[test]
    fn failure_event_payload_carries_retry_metadata() {
        let fsm = GraphFsm::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        fsm.set_event_handler(move |event| {
            if event.event_type == GraphEventType::BuildFailed {
                assert_eq!(event.payload.get("retry_count").and_then(|v| v.as_u64()), Some(1));
                assert_eq!(event.payload.get("can_retry").and_then(|v| v.as_bool()), Some(true));
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });
        fsm.start_build().unwrap();
        fsm.fail_build("net blip");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_panic_never_fails_the_transition() {
        let fsm = GraphFsm::new();
        fsm.set_event_handler(|_event| panic!("boom"));
        assert!(fsm.start_build().is_ok());
        assert_eq!(fsm.get_state(), GraphState::Building);
    }
}
