//! # v2e-store — Persistence & Validation Layer (C6)
//!
//! An embedded, `sled`-backed key-value store with two logical buckets:
//! `"memory-states"` (keyed by urn) and `"learning-session"` (a single
//! record keyed by the literal `"current"`). Records are JSON-encoded.
//! All operations are serialized by a reader-writer lock at the layer
//! level; `sled` itself provides ACID single-key writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use v2e_core::{LearningSessionState, MemoryObjectState, RetryPolicy, StoreError, Urn};

const MEMORY_TREE: &str = "memory-states";
const SESSION_TREE: &str = "learning-session";
const SESSION_KEY: &str = "current";
const OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Workspace-wide defaults, constructed directly by the caller rather than
/// loaded from a file or environment — there is no config loader here, only
/// a config value. Feeds both [`Store::open_with_config`] (`store_path`,
/// `open_timeout`) and `v2e_analyze::AnalyzeCoordinator::with_config`
/// (`history_cap`, `snapshot_cap_per_state`, `retry_policy`).
#[derive(Debug, Clone)]
pub struct V2eConfig {
    pub store_path: PathBuf,
    pub open_timeout: Duration,
    pub history_cap: usize,
    pub snapshot_cap_per_state: usize,
    pub retry_policy: RetryPolicy,
}

impl V2eConfig {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            ..Self::default()
        }
    }
}

impl Default for V2eConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./v2e-data"),
            open_timeout: OPEN_TIMEOUT,
            history_cap: 100,
            snapshot_cap_per_state: 5,
            retry_policy: RetryPolicy::default(),
        }
    }
}

pub struct Store {
    db: RwLock<sled::Db>,
    path: PathBuf,
}

impl Store {
    /// Opens (creating if absent) the store at `path`, bounded to a
    /// 1-second startup timeout.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(&V2eConfig::new(path.as_ref())).await
    }

    /// Opens the store using `config.store_path`, bounded to
    /// `config.open_timeout` rather than the workspace default.
    pub async fn open_with_config(config: &V2eConfig) -> Result<Self, StoreError> {
        let path = config.store_path.clone();
        let open_path = path.clone();
        let join = tokio::time::timeout(
            config.open_timeout,
            tokio::task::spawn_blocking(move || sled::open(&open_path)),
        )
        .await
        .map_err(|_| StoreError::Timeout)?;

        let db = join
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            db: RwLock::new(db),
            path,
        })
    }

    /// Idempotent: flushing an already-flushed store is a no-op failure
    /// mode at worst, never an error worth surfacing.
    pub fn close(&self) {
        let _ = self.db.read().flush();
    }

    fn memory_tree(&self) -> Result<sled::Tree, StoreError> {
        self.db
            .read()
            .open_tree(MEMORY_TREE)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn session_tree(&self) -> Result<sled::Tree, StoreError> {
        self.db
            .read()
            .open_tree(SESSION_TREE)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub fn save_memory_fsm_state(&self, state: &MemoryObjectState) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(state).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.memory_tree()?
            .insert(state.urn.as_str().as_bytes(), encoded)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    pub fn load_memory_fsm_state(&self, urn: &Urn) -> Result<MemoryObjectState, StoreError> {
        let bytes = self
            .memory_tree()?
            .get(urn.as_str().as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound { key: urn.as_str().to_string() })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            key: urn.as_str().to_string(),
            detail: e.to_string(),
        })
    }

    pub fn delete_memory_fsm_state(&self, urn: &Urn) -> Result<(), StoreError> {
        self.memory_tree()?
            .remove(urn.as_str().as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    pub fn get_all_memory_fsm_states(&self) -> Result<Vec<MemoryObjectState>, StoreError> {
        let tree = self.memory_tree()?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            let key = String::from_utf8_lossy(&key).into_owned();
            let record: MemoryObjectState = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Corrupt { key, detail: e.to_string() })?;
            out.push(record);
        }
        Ok(out)
    }

    /// Validates a single memory record against the rules in §4.6.
    /// Never mutates.
    pub fn validate_memory_fsm_state(&self, urn: &Urn) -> Result<(), StoreError> {
        let record = self.load_memory_fsm_state(urn)?;
        validate_memory_record(urn, &record)
    }

    /// Validates every stored memory record. Returns each urn's
    /// validation outcome rather than short-circuiting on the first
    /// failure.
    pub fn validate_all_memory_fsm_states(&self) -> Result<Vec<(Urn, Result<(), StoreError>)>, StoreError> {
        let records = self.get_all_memory_fsm_states()?;
        Ok(records
            .into_iter()
            .map(|record| {
                let urn = record.urn.clone();
                let outcome = validate_memory_record(&urn, &record);
                (urn, outcome)
            })
            .collect())
    }

    pub fn save_learning_fsm_state(&self, state: &LearningSessionState) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(state).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.session_tree()?
            .insert(SESSION_KEY, encoded)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    pub fn load_learning_fsm_state(&self) -> Result<LearningSessionState, StoreError> {
        let bytes = self
            .session_tree()?
            .get(SESSION_KEY)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound { key: SESSION_KEY.to_string() })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            key: SESSION_KEY.to_string(),
            detail: e.to_string(),
        })
    }

    pub fn clear_learning_fsm_state(&self) -> Result<(), StoreError> {
        self.session_tree()?
            .remove(SESSION_KEY)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    pub fn validate_learning_fsm_state(&self) -> Result<(), StoreError> {
        let record = self.load_learning_fsm_state()?;
        validate_session_record(&record)
    }

    /// Flushes, then copies the database directory into a temp sibling
    /// of `destination` and renames it into place — atomic on a POSIX
    /// filesystem for the final directory entry.
    pub fn backup(&self, destination: impl AsRef<Path>) -> Result<(), StoreError> {
        let db = self.db.write();
        db.flush().map_err(|e| StoreError::Backend(e.to_string()))?;

        let destination = destination.as_ref();
        let staging = destination.with_extension("staging");
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(io_err)?;
        }
        copy_dir_recursive(&self.path, &staging).map_err(io_err)?;
        std::fs::rename(&staging, destination).map_err(io_err)?;
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn validate_memory_record(urn: &Urn, record: &MemoryObjectState) -> Result<(), StoreError> {
    if &record.urn != urn {
        return Err(StoreError::Validation {
            detail: format!("record urn {} does not match key {}", record.urn, urn),
        });
    }
    if v2e_transition::MemoryState::parse(&record.current_state).is_none() {
        return Err(StoreError::Validation {
            detail: format!("unknown memory state {:?}", record.current_state),
        });
    }
    if record.created_at.is_zero() || record.updated_at.is_zero() {
        return Err(StoreError::Validation {
            detail: "createdAt/updatedAt must be non-zero".to_string(),
        });
    }
    let mut prev = None;
    for entry in &record.history {
        if let Some(prev) = prev {
            if entry.timestamp.as_datetime() < prev {
                return Err(StoreError::Validation {
                    detail: "history timestamps are not monotonically non-decreasing".to_string(),
                });
            }
        }
        prev = Some(entry.timestamp.as_datetime());
    }
    Ok(())
}

fn validate_session_record(record: &LearningSessionState) -> Result<(), StoreError> {
    if record.current_strategy != "bfs" && record.current_strategy != "dfs" {
        return Err(StoreError::Validation {
            detail: format!("unknown strategy {:?}", record.current_strategy),
        });
    }
    if record.session_start.is_zero() {
        return Err(StoreError::Validation {
            detail: "sessionStart must be non-zero".to_string(),
        });
    }
    if let Some(current) = &record.current_item_urn {
        if current.as_str().len() < 10 {
            return Err(StoreError::Validation {
                detail: "currentItemURN must be empty or at least 10 characters".to_string(),
            });
        }
    }
    if record.viewed_items.iter().any(|u| u.as_str().is_empty()) {
        return Err(StoreError::Validation {
            detail: "viewedItems contains an empty entry".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use v2e_core::{StateHistoryEntry, Timestamp};

    async fn open_temp() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).await.unwrap();
        (store, dir)
    }

    fn sample_memory(urn: &Urn) -> MemoryObjectState {
        let now = Timestamp::now();
        MemoryObjectState {
            urn: urn.clone(),
            current_state: "new".to_string(),
            history: vec![StateHistoryEntry {
                from: "new".to_string(),
                to: "new".to_string(),
                timestamp: now,
                reason: "init".to_string(),
                actor_id: Some("system".to_string()),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _dir) = open_temp().await;
        let urn = Urn::new("cve", "2024-0001").unwrap();
        let record = sample_memory(&urn);
        store.save_memory_fsm_state(&record).unwrap();

        let loaded = store.load_memory_fsm_state(&urn).unwrap();
        assert_eq!(loaded.current_state, "new");
        store.validate_memory_fsm_state(&urn).unwrap();
    }

    #[tokio::test]
    async fn open_with_config_honors_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = V2eConfig::new(dir.path().join("db"));
        let store = Store::open_with_config(&config).await.unwrap();
        let urn = Urn::new("cve", "2024-0006").unwrap();
        store.save_memory_fsm_state(&sample_memory(&urn)).unwrap();
        assert!(store.load_memory_fsm_state(&urn).is_ok());
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let (store, _dir) = open_temp().await;
        let urn = Urn::new("cve", "nope").unwrap();
        let err = store.load_memory_fsm_state(&urn).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let (store, _dir) = open_temp().await;
        let urn = Urn::new("cve", "2024-0002").unwrap();
        store.save_memory_fsm_state(&sample_memory(&urn)).unwrap();
        store.delete_memory_fsm_state(&urn).unwrap();
        assert!(store.load_memory_fsm_state(&urn).is_err());
    }

    #[tokio::test]
    async fn get_all_returns_every_stored_record() {
        let (store, _dir) = open_temp().await;
        for i in 0..3 {
            let id = format!("2024-{i:04}");
            let urn = Urn::new("cve", &id).unwrap();
            store.save_memory_fsm_state(&sample_memory(&urn)).unwrap();
        }
        assert_eq!(store.get_all_memory_fsm_states().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn validation_rejects_unknown_state() {
        let (store, _dir) = open_temp().await;
        let urn = Urn::new("cve", "2024-0003").unwrap();
        let mut record = sample_memory(&urn);
        record.current_state = "bogus".to_string();
        store.save_memory_fsm_state(&record).unwrap();
        assert!(store.validate_memory_fsm_state(&urn).is_err());
    }

    #[tokio::test]
    async fn validation_rejects_zero_timestamps() {
        let (store, _dir) = open_temp().await;
        let urn = Urn::new("cve", "2024-0004").unwrap();
        let mut record = sample_memory(&urn);
        record.created_at = Timestamp::zero();
        store.save_memory_fsm_state(&record).unwrap();
        assert!(store.validate_memory_fsm_state(&urn).is_err());
    }

    #[tokio::test]
    async fn session_save_load_round_trips() {
        let (store, _dir) = open_temp().await;
        let state = LearningSessionState::fresh();
        store.save_learning_fsm_state(&state).unwrap();
        let loaded = store.load_learning_fsm_state().unwrap();
        assert_eq!(loaded.current_strategy, "bfs");
        store.validate_learning_fsm_state().unwrap();
    }

    #[tokio::test]
    async fn session_clear_removes_the_record() {
        let (store, _dir) = open_temp().await;
        store.save_learning_fsm_state(&LearningSessionState::fresh()).unwrap();
        store.clear_learning_fsm_state().unwrap();
        assert!(store.load_learning_fsm_state().is_err());
    }

    #[tokio::test]
    async fn session_validation_rejects_bad_strategy() {
        let (store, _dir) = open_temp().await;
        let mut state = LearningSessionState::fresh();
        state.current_strategy = "greedy".to_string();
        store.save_learning_fsm_state(&state).unwrap();
        assert!(store.validate_learning_fsm_state().is_err());
    }

    #[tokio::test]
    async fn backup_produces_a_loadable_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).await.unwrap();
        let urn = Urn::new("cve", "2024-0005").unwrap();
        store.save_memory_fsm_state(&sample_memory(&urn)).unwrap();

        let backup_path = dir.path().join("backup");
        store.backup(&backup_path).unwrap();

        let restored = Store::open(&backup_path).await.unwrap();
        assert!(restored.load_memory_fsm_state(&urn).is_ok());
    }
}
