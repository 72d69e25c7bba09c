//! The Graph FSM (C2) itself: the guarded transition algorithm, retry,
//! rollback, and diagnostics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use v2e_core::{OperationError, RingBuffer, Timestamp, TransitionError};
use v2e_transition::{Flavor, GraphState};

use crate::types::{Diagnostics, GraphEventType, GraphLifecycleEvent, RetryPolicy, Snapshot, Transition};

type EventHandler = dyn Fn(GraphLifecycleEvent) + Send + Sync;
type HandlerBody = dyn FnOnce() -> Result<(), String> + Send;

struct Inner {
    current: GraphState,
    last_error: Option<OperationError>,
    last_failed_state: Option<GraphState>,
    last_operation: Option<String>,
    retry_count: u32,
    sequence_counter: u64,
}

/// The graph-processing engine lifecycle coordinator.
///
/// One `parking_lot::RwLock` guards the mutable core; history and
/// snapshots live behind their own `Mutex`es so diagnostic reads never
/// block a writer for long, per the concurrency model in `spec.md` §5.
pub struct GraphFsm {
    inner: RwLock<Inner>,
    history: Mutex<RingBuffer<Transition>>,
    snapshots: Mutex<HashMap<String, RingBuffer<Snapshot>>>,
    event_handler: RwLock<Option<Arc<EventHandler>>>,
    retry_policy: RetryPolicy,
    snapshot_cap_per_state: usize,
}

impl std::fmt::Debug for GraphFsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphFsm")
            .field("current", &self.get_state())
            .finish()
    }
}

impl GraphFsm {
    /// Construct a new Graph FSM in the initial `idle` state, with the
    /// default history cap (100) and snapshot cap (5 per state).
    pub fn new() -> Self {
        Self::with_capacity(RetryPolicy::default(), 100, 5)
    }

    pub fn with_capacity(
        retry_policy: RetryPolicy,
        history_cap: usize,
        snapshot_cap_per_state: usize,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: GraphState::Idle,
                last_error: None,
                last_failed_state: None,
                last_operation: None,
                retry_count: 0,
                sequence_counter: 0,
            }),
            history: Mutex::new(RingBuffer::new(history_cap)),
            snapshots: Mutex::new(HashMap::new()),
            event_handler: RwLock::new(None),
            retry_policy,
            snapshot_cap_per_state,
        }
    }

    pub fn get_state(&self) -> GraphState {
        self.inner.read().current
    }

    pub fn get_last_error(&self) -> Option<OperationError> {
        self.inner.read().last_error.clone()
    }

    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(GraphLifecycleEvent) + Send + Sync + 'static,
    {
        *self.event_handler.write() = Some(Arc::new(handler));
    }

    pub fn get_transition_history(&self, n: usize) -> Vec<Transition> {
        self.history.lock().recent(n)
    }

    pub fn get_failed_transitions(&self) -> Vec<Transition> {
        self.history
            .lock()
            .iter()
            .filter(|t| !t.success)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn clear_rollback_snapshots(&self) {
        self.snapshots.lock().clear();
    }

    pub fn get_diagnostics(&self) -> Diagnostics {
        let inner = self.inner.read();
        let history = self.history.lock();
        Diagnostics {
            current_state: inner.current.to_string(),
            last_error: inner.last_error.as_ref().map(|e| e.cause().to_string()),
            retry_count: inner.retry_count,
            last_operation: inner.last_operation.clone(),
            last_failed_state: inner.last_failed_state.map(|s| s.to_string()),
            can_recover: inner
                .last_error
                .as_ref()
                .map(|e| !e.is_permanent() && inner.retry_count <= self.retry_policy.max_retries)
                .unwrap_or(false),
            history_len: history.len(),
            failed_transition_count: history.iter().filter(|t| !t.success).count(),
            retry_policy: self.retry_policy,
        }
    }

    /// Event-handler errors (panics from caller code) are caught and
    /// logged; they never fail the transition that produced them.
    fn emit(&self, event: GraphLifecycleEvent) {
        let handler = self.event_handler.read().clone();
        if let Some(handler) = handler {
            let event_type = event.event_type;
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(?event_type, "event handler panicked; ignoring");
            }
        }
    }

    fn next_sequence(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.sequence_counter += 1;
        inner.sequence_counter
    }

    fn snapshot_current(&self, state: GraphState) {
        let seq = self.next_sequence();
        let snapshot = Snapshot {
            state_name: state.to_string(),
            timestamp: Timestamp::now(),
            payload: serde_json::json!({ "state": state.to_string() }),
            sequence_id: seq,
        };
        let mut snapshots = self.snapshots.lock();
        snapshots
            .entry(state.to_string())
            .or_insert_with(|| RingBuffer::new(self.snapshot_cap_per_state))
            .push(snapshot);
    }

    fn append_history(&self, entry: Transition) {
        self.history.lock().push(entry);
    }

    /// The guarded transition algorithm (§4.2 steps 1-8), without a
    /// caller-supplied handler body.
    fn guarded_transition(&self, target: GraphState) -> Result<(), TransitionError> {
        self.guarded_transition_inner(target, None)
    }

    fn guarded_transition_inner(
        &self,
        target: GraphState,
        handler: Option<Box<HandlerBody>>,
    ) -> Result<(), TransitionError> {
        let t0 = Instant::now();
        let current = self.get_state();

        self.snapshot_current(current);

        if !v2e_transition::valid(Flavor::Graph, current.as_str(), target.as_str()) {
            let err = TransitionError::invalid(current.as_str(), target.as_str());
            self.append_history(Transition {
                from_state: current.to_string(),
                to_state: target.to_string(),
                timestamp: Timestamp::now(),
                success: false,
                duration: t0.elapsed(),
                error_message: Some(err.to_string()),
            });
            tracing::warn!(from = %current, to = %target, duration_ms = t0.elapsed().as_millis() as u64, "rejected invalid graph transition");
            return Err(err);
        }

        {
            let mut inner = self.inner.write();
            if current == GraphState::Error && target != GraphState::Error {
                inner.retry_count = 0;
                inner.last_error = None;
                inner.last_failed_state = None;
            }
            inner.current = target;
        }

        if let Some(handler) = handler {
            if let Err(cause) = handler() {
                let mut inner = self.inner.write();
                inner.current = current;
                drop(inner);
                self.append_history(Transition {
                    from_state: current.to_string(),
                    to_state: target.to_string(),
                    timestamp: Timestamp::now(),
                    success: false,
                    duration: t0.elapsed(),
                    error_message: Some(cause.clone()),
                });
                tracing::error!(from = %current, to = %target, %cause, "transition handler failed, rolled back");
                return Err(TransitionError::handler_failed(
                    current.as_str(),
                    target.as_str(),
                    cause,
                ));
            }
        }

        self.append_history(Transition {
            from_state: current.to_string(),
            to_state: target.to_string(),
            timestamp: Timestamp::now(),
            success: true,
            duration: t0.elapsed(),
            error_message: None,
        });
        tracing::debug!(from = %current, to = %target, duration_ms = t0.elapsed().as_millis() as u64, "graph transition committed");
        Ok(())
    }

    fn simple_transition(
        &self,
        target: GraphState,
        event_type: GraphEventType,
    ) -> Result<(), TransitionError> {
        self.guarded_transition(target)?;
        self.inner.write().last_operation = Some(operation_name(event_type).to_string());
        self.emit(GraphLifecycleEvent::new(event_type));
        Ok(())
    }

    /// Run an arbitrary, potentially-blocking handler body outside the
    /// lock as part of the transition. On handler failure the state is
    /// rolled back and `TRANSITION_FAILED` is returned.
    pub fn transition_with_handler<F>(
        &self,
        target: GraphState,
        handler: F,
    ) -> Result<(), TransitionError>
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.guarded_transition_inner(target, Some(Box::new(handler)))
    }

    /// The raw, unguarded verb used by tests to exercise validator
    /// rejection directly (scenario 3 in `spec.md` §8): no event is
    /// emitted regardless of outcome.
    pub fn transition(&self, target: GraphState) -> Result<(), TransitionError> {
        self.guarded_transition(target)
    }

    pub fn start_build(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Building, GraphEventType::BuildStarted)
    }

    pub fn complete_build(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Ready, GraphEventType::BuildCompleted)
    }

    pub fn start_analysis(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Analyzing, GraphEventType::AnalysisStarted)
    }

    pub fn complete_analysis(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Ready, GraphEventType::AnalysisCompleted)
    }

    pub fn start_persist(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Persisting, GraphEventType::PersistStarted)
    }

    pub fn complete_persist(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Ready, GraphEventType::PersistCompleted)
    }

    pub fn clear(&self) -> Result<(), TransitionError> {
        self.simple_transition(GraphState::Idle, GraphEventType::Cleared)
    }

    /// Forced return to `idle`, clearing retry/error bookkeeping
    /// regardless of whether the move is in the validator's allowed set
    /// — mirrors `RollbackToState`'s "forced, logged" semantics.
    pub fn reset(&self) {
        let current = self.get_state();
        self.snapshot_current(current);
        {
            let mut inner = self.inner.write();
            inner.current = GraphState::Idle;
            inner.retry_count = 0;
            inner.last_error = None;
            inner.last_failed_state = None;
        }
        self.append_history(Transition {
            from_state: current.to_string(),
            to_state: GraphState::Idle.to_string(),
            timestamp: Timestamp::now(),
            success: true,
            duration: std::time::Duration::ZERO,
            error_message: None,
        });
        tracing::info!(from = %current, "graph fsm reset to idle");
    }

    fn fail_operation(&self, cause: OperationErrorArg, event_type: GraphEventType) {
        let current = self.get_state();
        self.snapshot_current(current);

        let op_error = match cause {
            OperationErrorArg::Tagged(e) => e,
            OperationErrorArg::Cause(c) => OperationError::tag_transient(current.to_string(), c),
        };

        let valid = v2e_transition::valid(Flavor::Graph, current.as_str(), GraphState::Error.as_str());
        if !valid {
            tracing::warn!(from = %current, "forcing transition to error from a state not listed as valid");
        }

        let retry_count = {
            let mut inner = self.inner.write();
            inner.current = GraphState::Error;
            inner.last_failed_state = Some(current);
            inner.last_error = Some(op_error.clone());
            inner.last_operation = Some(operation_name(event_type).to_string());
            inner.retry_count += 1;
            inner.retry_count
        };

        self.append_history(Transition {
            from_state: current.to_string(),
            to_state: GraphState::Error.to_string(),
            timestamp: Timestamp::now(),
            success: true,
            duration: std::time::Duration::ZERO,
            error_message: Some(op_error.cause().to_string()),
        });

        let can_retry = retry_count <= self.retry_policy.max_retries;
        tracing::error!(%current, cause = op_error.cause(), retry_count, can_retry, "graph operation failed");
        self.emit(
            GraphLifecycleEvent::new(event_type)
                .with_payload("error", op_error.cause())
                .with_payload("retry_count", retry_count)
                .with_payload("can_retry", can_retry),
        );
    }

    pub fn fail_build(&self, cause: impl Into<String>) {
        self.fail_operation(OperationErrorArg::Cause(cause.into()), GraphEventType::BuildFailed);
    }

    pub fn fail_analysis(&self, cause: impl Into<String>) {
        self.fail_operation(OperationErrorArg::Cause(cause.into()), GraphEventType::AnalysisFailed);
    }

    pub fn fail_persist(&self, cause: impl Into<String>) {
        self.fail_operation(OperationErrorArg::Cause(cause.into()), GraphEventType::PersistFailed);
    }

    pub fn fail_build_with(&self, cause: OperationError) {
        self.fail_operation(OperationErrorArg::Tagged(cause), GraphEventType::BuildFailed);
    }

    pub fn fail_analysis_with(&self, cause: OperationError) {
        self.fail_operation(OperationErrorArg::Tagged(cause), GraphEventType::AnalysisFailed);
    }

    pub fn fail_persist_with(&self, cause: OperationError) {
        self.fail_operation(OperationErrorArg::Tagged(cause), GraphEventType::PersistFailed);
    }

    /// Retry the verb that produced the last failure, after sleeping for
    /// the backoff delay. Refuses (P4) if there was no prior failure, the
    /// retry ceiling is exceeded, or the last error is permanent.
    pub async fn retry_failed_operation(&self) -> Result<(), TransitionError> {
        let (last_failed_state, retry_count, permanent) = {
            let inner = self.inner.read();
            (
                inner.last_failed_state,
                inner.retry_count,
                inner.last_error.as_ref().map(|e| e.is_permanent()).unwrap_or(false),
            )
        };

        let Some(last_failed_state) = last_failed_state else {
            return Err(TransitionError::recovery_exhausted("error", "error", retry_count));
        };
        if retry_count > self.retry_policy.max_retries || permanent {
            return Err(TransitionError::recovery_exhausted(
                GraphState::Error.as_str(),
                last_failed_state.as_str(),
                retry_count,
            ));
        }

        let delay = self.retry_policy.delay_for(retry_count);
        tokio::time::sleep(delay).await;

        match last_failed_state {
            GraphState::Building => self.start_build(),
            GraphState::Analyzing => self.start_analysis(),
            GraphState::Persisting => self.start_persist(),
            _ => Err(TransitionError::recovery_exhausted(
                GraphState::Error.as_str(),
                last_failed_state.as_str(),
                retry_count,
            )),
        }
    }

    /// Forced restoration to `target` from its latest snapshot, bypassing
    /// the validator. Used only by internal recovery paths.
    pub fn rollback_to_state(&self, target: GraphState) {
        let current = self.get_state();
        let found = {
            let snapshots = self.snapshots.lock();
            snapshots.get(target.as_str()).and_then(|r| r.last().cloned())
        };
        if found.is_none() {
            tracing::warn!(%target, "rollback target has no snapshot; forcing move anyway");
        }
        {
            let mut inner = self.inner.write();
            inner.current = target;
        }
        self.append_history(Transition {
            from_state: current.to_string(),
            to_state: target.to_string(),
            timestamp: Timestamp::now(),
            success: true,
            duration: std::time::Duration::ZERO,
            error_message: if found.is_none() {
                Some("rollback target had no snapshot".to_string())
            } else {
                None
            },
        });
    }
}

impl Default for GraphFsm {
    fn default() -> Self {
        Self::new()
    }
}

enum OperationErrorArg {
    Tagged(OperationError),
    Cause(String),
}

fn operation_name(event_type: GraphEventType) -> &'static str {
    match event_type {
        GraphEventType::BuildStarted => "start_build",
        GraphEventType::BuildCompleted => "complete_build",
        GraphEventType::BuildFailed => "fail_build",
        GraphEventType::AnalysisStarted => "start_analysis",
        GraphEventType::AnalysisCompleted => "complete_analysis",
        GraphEventType::AnalysisFailed => "fail_analysis",
        GraphEventType::PersistStarted => "start_persist",
        GraphEventType::PersistCompleted => "complete_persist",
        GraphEventType::PersistFailed => "fail_persist",
        GraphEventType::Cleared => "clear",
        GraphEventType::Paused => "pause",
        GraphEventType::Resumed => "resume",
        GraphEventType::ResourceConstrained => "resource_constrained",
    }
}
