//! # v2e-analyze — Analyze Coordinator FSM (C3)
//!
//! Owns a Graph FSM (C2) for its whole process lifetime, registers itself
//! as that child's event handler, and maps the child's lifecycle events
//! onto its own state: `bootstrapping → idle → processing → paused →
//! draining → terminated`.

use std::sync::Arc;

use parking_lot::RwLock;
use v2e_core::{Timestamp, TransitionError};
use v2e_graph::{GraphEventType, GraphFsm, GraphLifecycleEvent};
use v2e_store::V2eConfig;
use v2e_transition::{AnalyzeState, Flavor};

/// The kind of lifecycle event the Analyze Coordinator itself emits —
/// distinct from the `GraphEventType`s its child `GraphFsm` emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeEventType {
    AnalysisPaused,
    AnalysisResumed,
}

/// A lifecycle event bubbled to the coordinator's registered handler.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalyzeLifecycleEvent {
    pub event_type: AnalyzeEventType,
    pub timestamp: Timestamp,
}

impl AnalyzeLifecycleEvent {
    fn new(event_type: AnalyzeEventType) -> Self {
        Self {
            event_type,
            timestamp: Timestamp::now(),
        }
    }
}

type AnalyzeEventHandler = dyn Fn(AnalyzeLifecycleEvent) + Send + Sync;

struct Inner {
    current: AnalyzeState,
}

/// Supervises a [`GraphFsm`] and tracks coordinator-level availability.
///
/// `HandleEvent` is invoked by the child on the thread that committed the
/// child's transition, after the child released its own lock (§5). It
/// takes only `self.inner`'s lock, briefly, and never calls back into the
/// `GraphFsm` from inside that lock.
pub struct AnalyzeCoordinator {
    inner: RwLock<Inner>,
    graph: Arc<GraphFsm>,
    event_handler: RwLock<Option<Arc<AnalyzeEventHandler>>>,
}

impl AnalyzeCoordinator {
    /// Construct around a fresh Graph FSM.
    pub fn new() -> Arc<Self> {
        Self::with_graph(Arc::new(GraphFsm::new()))
    }

    /// Construct with a Graph FSM sized from `config`'s history/snapshot
    /// caps and retry policy, rather than `GraphFsm::new`'s defaults.
    pub fn with_config(config: &V2eConfig) -> Arc<Self> {
        let graph = GraphFsm::with_capacity(config.retry_policy, config.history_cap, config.snapshot_cap_per_state);
        Self::with_graph(Arc::new(graph))
    }

    /// Construct around an injected Graph FSM, registering as its event
    /// handler. The coordinator exclusively owns `graph` from this point
    /// (§3 "Ownership & lifecycle").
    pub fn with_graph(graph: Arc<GraphFsm>) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            inner: RwLock::new(Inner {
                current: AnalyzeState::Bootstrapping,
            }),
            graph,
            event_handler: RwLock::new(None),
        });

        let weak = Arc::downgrade(&coordinator);
        coordinator.graph.set_event_handler(move |event| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.handle_event(event);
            }
        });

        coordinator
    }

    pub fn graph(&self) -> &Arc<GraphFsm> {
        &self.graph
    }

    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(AnalyzeLifecycleEvent) + Send + Sync + 'static,
    {
        *self.event_handler.write() = Some(Arc::new(handler));
    }

    /// Mirrors `GraphFsm::emit`: handler panics are caught and logged,
    /// never allowed to fail the verb that produced the event.
    fn emit(&self, event_type: AnalyzeEventType) {
        let handler = self.event_handler.read().clone();
        if let Some(handler) = handler {
            let event = AnalyzeLifecycleEvent::new(event_type);
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(?event_type, "analyze event handler panicked; ignoring");
            }
        }
    }

    pub fn get_state(&self) -> AnalyzeState {
        self.inner.read().current
    }

    /// `true` iff the coordinator can currently accept analysis work.
    pub fn can_process(&self) -> bool {
        matches!(self.get_state(), AnalyzeState::Idle | AnalyzeState::Processing)
    }

    /// `true` iff the coordinator has not begun shutting down.
    pub fn is_healthy(&self) -> bool {
        !matches!(self.get_state(), AnalyzeState::Draining | AnalyzeState::Terminated)
    }

    /// Returns `Ok(true)` iff a transition actually occurred (the
    /// same-state no-op case returns `Ok(false)`, so callers can tell
    /// whether to emit a lifecycle event for the move).
    fn try_move(&self, target: AnalyzeState) -> Result<bool, TransitionError> {
        let mut inner = self.inner.write();
        let current = inner.current;
        if current == target {
            return Ok(false);
        }
        if !v2e_transition::valid(Flavor::Analyze, current.as_str(), target.as_str()) {
            return Err(TransitionError::invalid(current.as_str(), target.as_str()));
        }
        inner.current = target;
        tracing::debug!(from = %current, to = %target, "analyze coordinator transition");
        Ok(true)
    }

    /// Only valid from `bootstrapping`.
    pub fn start(&self) -> Result<(), TransitionError> {
        self.try_move(AnalyzeState::Idle)?;
        Ok(())
    }

    /// Emits `AnalysisPaused` on an actual transition into `paused`.
    pub fn pause(&self) -> Result<(), TransitionError> {
        if self.try_move(AnalyzeState::Paused)? {
            self.emit(AnalyzeEventType::AnalysisPaused);
        }
        Ok(())
    }

    /// No-op (not an error) from any state other than `paused`, per §4.3.
    /// Emits `AnalysisResumed` only on the genuine `paused -> idle` move.
    pub fn resume(&self) -> Result<(), TransitionError> {
        if self.get_state() != AnalyzeState::Paused {
            return Ok(());
        }
        if self.try_move(AnalyzeState::Idle)? {
            self.emit(AnalyzeEventType::AnalysisResumed);
        }
        Ok(())
    }

    /// `draining`, then immediately `terminated` — there is no long-lived
    /// drain step in this workspace's scope; in-flight Graph FSM work is
    /// not tracked by the coordinator.
    pub fn stop(&self) -> Result<(), TransitionError> {
        self.try_move(AnalyzeState::Draining)?;
        self.try_move(AnalyzeState::Terminated)?;
        Ok(())
    }

    /// Calls `pause` only if currently `processing`.
    pub fn on_resource_constrained(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.get_state() == AnalyzeState::Processing {
            tracing::warn!(%reason, "pausing under resource constraint");
            let _ = self.pause();
        }
    }

    /// Maps a child Graph FSM lifecycle event onto coordinator state, per
    /// the §4.3 event-handler mapping table.
    fn handle_event(&self, event: GraphLifecycleEvent) {
        let mut inner = self.inner.write();
        match event.event_type {
            GraphEventType::BuildStarted => {
                if inner.current == AnalyzeState::Idle {
                    inner.current = AnalyzeState::Processing;
                }
            }
            GraphEventType::BuildCompleted
            | GraphEventType::AnalysisCompleted
            | GraphEventType::PersistCompleted => {
                if inner.current == AnalyzeState::Processing {
                    inner.current = AnalyzeState::Idle;
                }
            }
            GraphEventType::BuildFailed | GraphEventType::PersistFailed => {
                // Remain in processing; the caller may retry.
            }
            GraphEventType::Cleared => {
                if inner.current == AnalyzeState::Processing {
                    inner.current = AnalyzeState::Idle;
                }
            }
            _ => {}
        }
    }
}
