//! # v2e-session — Learning Session FSM (C5)
//!
//! Walks a catalog of security knowledge items under one of two
//! strategies (`"bfs"`/`"dfs"`), tracking viewed/completed items and a
//! backtracking stack, persisting through `v2e-store`. The ItemGraph is
//! built once at construction and exposed read-only for callers deciding
//! where to navigate; `FollowLink` itself takes an explicit destination
//! rather than consulting the graph.

mod graph;

pub use graph::ItemGraph;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use v2e_core::{LearningSessionState, SecurityItem, StoreError, Timestamp, Urn};
use v2e_store::Store;

const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// The session's presentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Browsing,
    DeepDive,
    Paused,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Browsing => "browsing",
            Self::DeepDive => "deep_dive",
            Self::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "browsing" => Some(Self::Browsing),
            "deep_dive" => Some(Self::DeepDive),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no more items to review")]
    NoMoreItems,
    #[error("unknown strategy")]
    UnknownStrategy,
    #[error("session is not paused")]
    NotPaused,
    #[error("item {0} not found in catalog")]
    ItemNotFound(Urn),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("persistence timed out or was cancelled")]
    Timeout,
}

/// Defensive-copy view of the session's non-presentation bookkeeping; the
/// catalog itself is shared read-only via [`SessionFsm::catalog`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub viewed_items: Vec<Urn>,
    pub completed_items: Vec<Urn>,
    pub path_stack: Vec<Urn>,
}

pub struct SessionFsm {
    catalog: Arc<Vec<SecurityItem>>,
    graph: ItemGraph,
    store: Arc<Store>,
    state: RwLock<LearningSessionState>,
    dedupe_follow_link_views: bool,
}

impl SessionFsm {
    /// Builds the ItemGraph, then attempts to load a prior session from
    /// `store`; starts fresh (`idle`, `"bfs"`) on any load failure.
    /// `FollowLink`'s duplicate-append into `viewedItems` is preserved by
    /// default — use [`SessionFsm::with_dedupe_follow_link_views`] to opt
    /// into the deduped behavior instead.
    pub fn new(catalog: Arc<Vec<SecurityItem>>, store: Arc<Store>) -> Self {
        Self::with_dedupe_follow_link_views(catalog, store, false)
    }

    /// Same as [`SessionFsm::new`], but with an explicit choice for whether
    /// `follow_link` dedupes its append into `viewedItems`. Defaults to
    /// `false` (legacy behavior) via `new`.
    pub fn with_dedupe_follow_link_views(
        catalog: Arc<Vec<SecurityItem>>,
        store: Arc<Store>,
        dedupe_follow_link_views: bool,
    ) -> Self {
        let graph = ItemGraph::build(&catalog);
        let state = store
            .load_learning_fsm_state()
            .unwrap_or_else(|_| LearningSessionState::fresh());
        Self {
            catalog,
            graph,
            store,
            state: RwLock::new(state),
            dedupe_follow_link_views,
        }
    }

    fn find_item(&self, urn: &Urn) -> Option<SecurityItem> {
        self.catalog.iter().find(|item| &item.urn == urn).cloned()
    }

    fn persist_sync(&self) -> Result<(), StoreError> {
        let snapshot = self.state.read().clone();
        self.store.save_learning_fsm_state(&snapshot)
    }

    async fn persist_with_timeout(&self, ctx: &CancellationToken) -> Result<(), SessionError> {
        let snapshot = self.state.read().clone();
        let store = self.store.clone();
        let work = tokio::task::spawn_blocking(move || store.save_learning_fsm_state(&snapshot));
        tokio::select! {
            _ = ctx.cancelled() => Err(SessionError::Timeout),
            _ = tokio::time::sleep(PERSIST_TIMEOUT) => Err(SessionError::Timeout),
            joined = work => {
                joined.map_err(|e| SessionError::Store(StoreError::Backend(e.to_string())))?
                    .map_err(SessionError::Store)
            }
        }
    }

    pub fn catalog(&self) -> &Arc<Vec<SecurityItem>> {
        &self.catalog
    }

    /// Outgoing links from `urn` in the ItemGraph, for a caller deciding
    /// what to pass to [`SessionFsm::follow_link`].
    pub fn links_from(&self, urn: &Urn) -> Vec<Urn> {
        self.graph.links_from(urn).to_vec()
    }

    pub fn get_state(&self) -> SessionState {
        let s = self.state.read().session_state.clone();
        SessionState::parse(&s).unwrap_or(SessionState::Idle)
    }

    pub fn get_context(&self) -> SessionContext {
        let state = self.state.read();
        SessionContext {
            viewed_items: state.viewed_items.clone(),
            completed_items: state.completed_items.clone(),
            path_stack: state.path_stack.clone(),
        }
    }

    /// §4.5 LoadItem algorithm.
    pub fn load_item(&self) -> Result<SecurityItem, SessionError> {
        let mut state = self.state.write();
        state.last_activity = Timestamp::now();

        if let Some(current) = state.current_item_urn.clone() {
            state.session_state = match state.current_strategy.as_str() {
                "dfs" => SessionState::DeepDive.to_string(),
                _ => SessionState::Browsing.to_string(),
            };
            drop(state);
            return self.find_item(&current).ok_or(SessionError::ItemNotFound(current));
        }

        match state.current_strategy.clone().as_str() {
            "bfs" => {
                state.session_state = SessionState::Browsing.to_string();
                let next = self
                    .catalog
                    .iter()
                    .find(|item| !state.viewed_items.contains(&item.urn))
                    .cloned();
                match next {
                    Some(item) => {
                        state.current_item_urn = Some(item.urn.clone());
                        Ok(item)
                    }
                    None => Err(SessionError::NoMoreItems),
                }
            }
            "dfs" => {
                if state.path_stack.is_empty() {
                    state.current_strategy = "bfs".to_string();
                    state.session_state = SessionState::Browsing.to_string();
                    drop(state);
                    return self.load_item();
                }
                state.session_state = SessionState::DeepDive.to_string();
                let top = state.path_stack.pop().expect("checked non-empty above");
                state.current_item_urn = Some(top.clone());
                drop(state);
                self.find_item(&top).ok_or(SessionError::ItemNotFound(top))
            }
            _ => Err(SessionError::UnknownStrategy),
        }
    }

    /// No-op if already viewed; otherwise appends and persists with a
    /// 5-second cancellation-aware timeout.
    pub async fn mark_viewed(&self, urn: &Urn, ctx: &CancellationToken) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if state.viewed_items.contains(urn) {
                return Ok(());
            }
            state.viewed_items.push(urn.clone());
            state.updated_at = Timestamp::now();
        }
        self.persist_with_timeout(ctx).await
    }

    /// No-op if already completed; otherwise appends, clears
    /// `currentItemURN` if it matches, and persists.
    pub async fn mark_learned(&self, urn: &Urn, ctx: &CancellationToken) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if state.completed_items.contains(urn) {
                return Ok(());
            }
            state.completed_items.push(urn.clone());
            if state.current_item_urn.as_ref() == Some(urn) {
                state.current_item_urn = None;
            }
            state.updated_at = Timestamp::now();
        }
        self.persist_with_timeout(ctx).await
    }

    /// Pushes `from` onto the backtracking stack (only when a current
    /// item already exists), switches to `dfs`/`deep_dive`, makes `to`
    /// current, and appends `to` to `viewedItems` — duplicate appends
    /// permitted here by default, unlike `mark_viewed`'s dedup check.
    /// Controlled by `dedupe_follow_link_views`, off unless the caller
    /// opted in via [`SessionFsm::with_dedupe_follow_link_views`].
    pub fn follow_link(&self, from: &Urn, to: &Urn) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if state.current_item_urn.is_some() {
                state.path_stack.push(from.clone());
            }
            state.current_strategy = "dfs".to_string();
            state.session_state = SessionState::DeepDive.to_string();
            state.current_item_urn = Some(to.clone());
            if !self.dedupe_follow_link_views || !state.viewed_items.contains(to) {
                state.viewed_items.push(to.clone());
            }
            state.updated_at = Timestamp::now();
        }
        self.persist_sync()?;
        Ok(())
    }

    /// If `pathStack` is empty, resets to `browsing`/`bfs` and delegates
    /// to `load_item`. Otherwise pops the stack and returns that item.
    pub fn go_back(&self) -> Result<SecurityItem, SessionError> {
        let popped = {
            let mut state = self.state.write();
            let popped = state.path_stack.pop();
            if let Some(urn) = &popped {
                state.current_item_urn = Some(urn.clone());
            } else {
                state.current_strategy = "bfs".to_string();
                state.session_state = SessionState::Browsing.to_string();
                state.current_item_urn = None;
            }
            popped
        };
        self.persist_sync()?;
        match popped {
            Some(urn) => self.find_item(&urn).ok_or(SessionError::ItemNotFound(urn)),
            None => self.load_item(),
        }
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            state.session_state = SessionState::Paused.to_string();
            state.updated_at = Timestamp::now();
        }
        self.persist_sync()?;
        Ok(())
    }

    /// Fails if not currently paused; otherwise returns to `browsing`.
    pub fn resume(&self) -> Result<(), SessionError> {
        {
            let state = self.state.read();
            if state.session_state != SessionState::Paused.to_string() {
                return Err(SessionError::NotPaused);
            }
        }
        {
            let mut state = self.state.write();
            state.session_state = SessionState::Browsing.to_string();
            state.updated_at = Timestamp::now();
        }
        self.persist_sync()?;
        Ok(())
    }

    pub async fn save_state(&self, ctx: &CancellationToken) -> Result<(), SessionError> {
        self.persist_with_timeout(ctx).await
    }

    /// Re-reads the record from persistence, replacing the in-memory copy.
    pub fn load_state(&self) -> Result<(), SessionError> {
        let loaded = self.store.load_learning_fsm_state()?;
        *self.state.write() = loaded;
        Ok(())
    }
}
