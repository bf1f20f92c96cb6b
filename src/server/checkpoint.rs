//! Checkpoint manager — decides when to snapshot in-flight reasoning and
//! persists/restores those snapshots via the session store.
//!
//! Snapshots live under `session.metadata.pending_executions[taskID]`,
//! encoded with [`ExecutionStateCodec`]. `Save` merges into the existing
//! `pending_executions` map rather than replacing it, so concurrent pauses
//! on unrelated tasks in the same session never clobber each other.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{A2AError, A2AResult};

use super::execution_state::{ExecutionState, ExecutionStateCodec};
use super::session_store::{SessionStore, PENDING_EXECUTIONS_KEY};

/// Configurable policy deciding when the executor should take a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStrategy {
    /// Snapshot only on a HITL pause.
    Event,
    /// Additionally snapshot at the end of every Nth iteration.
    Interval,
    /// Union of `Event` and `Interval`.
    Hybrid,
}

impl CheckpointStrategy {
    /// Parse the configuration string form (`"event"`, `"interval"`, `"hybrid"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(Self::Event),
            "interval" => Some(Self::Interval),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Whether this strategy checkpoints on HITL pause.
    pub fn checkpoints_on_event(&self) -> bool {
        matches!(self, Self::Event | Self::Hybrid)
    }

    /// Whether this strategy checkpoints on interval boundaries.
    pub fn checkpoints_on_interval(&self) -> bool {
        matches!(self, Self::Interval | Self::Hybrid)
    }
}

/// Returns `true` iff iteration `i` is an interval-checkpoint boundary for
/// interval size `n`: `n > 0 ∧ i > 0 ∧ i mod n == 0`.
pub fn should_checkpoint_interval(i: u64, n: i64) -> bool {
    n > 0 && i > 0 && i % (n as u64) == 0
}

/// Saves, loads, and clears [`ExecutionState`] snapshots keyed by
/// `(sessionID, taskID)`.
pub struct CheckpointManager {
    session_store: Arc<dyn SessionStore>,
    resume_timeout_secs: i64,
}

impl CheckpointManager {
    /// Create a manager backed by the given session store. `resume_timeout_secs`
    /// is the `Task.ResumeTimeout` configuration value (seconds; `<= 0` disables
    /// expiry).
    pub fn new(session_store: Arc<dyn SessionStore>, resume_timeout_secs: i64) -> Self {
        Self {
            session_store,
            resume_timeout_secs,
        }
    }

    /// Checkpointing is only meaningful when the attached session store is
    /// persistent — async HITL and crash recovery both depend on the
    /// snapshot surviving past the current process.
    pub fn is_usable(&self) -> bool {
        self.session_store.is_persistent()
    }

    /// Persist `state`, merging it into the session's `pending_executions`
    /// map. Other pending entries in the same session are left untouched.
    pub async fn save(&self, mut state: ExecutionState) -> A2AResult<()> {
        if state.checkpoint.timestamp.is_empty() {
            state.checkpoint.timestamp = Utc::now().to_rfc3339();
        }
        let task_id = state.task_id.clone();
        let context_id = state.context_id.clone();
        let encoded = ExecutionStateCodec::encode(&state)
            .map_err(|e| A2AError::StrategyError(format!("failed to encode checkpoint: {e}")))?;

        self.session_store
            .update_metadata(
                &context_id,
                Box::new(move |meta| {
                    let pending = meta
                        .entry(PENDING_EXECUTIONS_KEY)
                        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
                    if let Some(obj) = pending.as_object_mut() {
                        obj.insert(task_id.clone(), encoded);
                    }
                }),
            )
            .await?;

        debug!(context_id = %state.context_id, task_id = %state.task_id, "Checkpoint saved");
        Ok(())
    }

    /// Load the snapshot for `(session_id, task_id)`. Returns
    /// `A2AError::TaskNotFound` if the session has no metadata, no
    /// `pending_executions` key, or no entry for this task, and
    /// `A2AError::Expired` if the entry exists but is older than
    /// `resume_timeout_secs`.
    pub async fn load(&self, session_id: &str, task_id: &str) -> A2AResult<ExecutionState> {
        let session = self
            .session_store
            .get(session_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(format!("no session {session_id}")))?;

        let entry = session
            .metadata
            .get(PENDING_EXECUTIONS_KEY)
            .and_then(|v| v.as_object())
            .and_then(|obj| obj.get(task_id))
            .ok_or_else(|| {
                A2AError::task_not_found(format!(
                    "no pending execution for task {task_id} in session {session_id}"
                ))
            })?;

        let state = ExecutionStateCodec::decode(entry)
            .map_err(|e| A2AError::StrategyError(format!("failed to decode checkpoint: {e}")))?;

        if state.is_expired(self.resume_timeout_secs) {
            return Err(A2AError::Expired {
                task_id: task_id.to_string(),
            });
        }

        Ok(state)
    }

    /// Remove the snapshot for `(session_id, task_id)`. Removes the whole
    /// `pending_executions` key when it becomes empty. Idempotent — clearing
    /// an already-absent entry is not an error.
    pub async fn clear(&self, session_id: &str, task_id: &str) -> A2AResult<()> {
        let task_id = task_id.to_string();
        self.session_store
            .update_metadata(
                session_id,
                Box::new(move |meta| {
                    let Some(pending) = meta.get_mut(PENDING_EXECUTIONS_KEY) else {
                        return;
                    };
                    if let Some(obj) = pending.as_object_mut() {
                        obj.remove(&task_id);
                        if obj.is_empty() {
                            meta.remove(PENDING_EXECUTIONS_KEY);
                        }
                    }
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::session_store::InMemorySessionStore;

    fn manager(timeout: i64) -> CheckpointManager {
        CheckpointManager::new(Arc::new(InMemorySessionStore::new()), timeout)
    }

    #[test]
    fn interval_boundary_matches_invariant() {
        assert!(!should_checkpoint_interval(0, 5));
        assert!(!should_checkpoint_interval(3, 5));
        assert!(should_checkpoint_interval(5, 5));
        assert!(should_checkpoint_interval(10, 5));
        assert!(!should_checkpoint_interval(5, 0));
        assert!(!should_checkpoint_interval(5, -1));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let mgr = manager(0);
        let state = ExecutionState::new("task-1", "ctx-1", "hi");
        mgr.save(state.clone()).await.unwrap();
        let loaded = mgr.load("ctx-1", "task-1").await.unwrap();
        assert_eq!(loaded.task_id, state.task_id);
        assert_eq!(loaded.user_query, state.user_query);
    }

    #[tokio::test]
    async fn clear_removes_only_named_task() {
        let mgr = manager(0);
        mgr.save(ExecutionState::new("task-1", "ctx-1", "a"))
            .await
            .unwrap();
        mgr.save(ExecutionState::new("task-2", "ctx-1", "b"))
            .await
            .unwrap();

        mgr.clear("ctx-1", "task-1").await.unwrap();

        assert!(mgr.load("ctx-1", "task-1").await.is_err());
        assert!(mgr.load("ctx-1", "task-2").await.is_ok());
    }

    #[tokio::test]
    async fn clear_drops_pending_executions_key_when_empty() {
        let mgr = manager(0);
        mgr.save(ExecutionState::new("task-1", "ctx-1", "a"))
            .await
            .unwrap();
        mgr.clear("ctx-1", "task-1").await.unwrap();

        let session = mgr.session_store.get("ctx-1").await.unwrap().unwrap();
        assert!(!session.metadata.contains_key(PENDING_EXECUTIONS_KEY));
    }

    #[tokio::test]
    async fn load_missing_task_returns_not_found() {
        let mgr = manager(0);
        let err = mgr.load("ctx-1", "nope").await.unwrap_err();
        assert!(matches!(err, A2AError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn expired_checkpoint_is_rejected() {
        let mgr = manager(1);
        let mut state = ExecutionState::new("task-1", "ctx-1", "hi");
        state.checkpoint.timestamp = (Utc::now() - chrono::Duration::seconds(5)).to_rfc3339();
        mgr.save(state).await.unwrap();

        let err = mgr.load("ctx-1", "task-1").await.unwrap_err();
        assert!(matches!(err, A2AError::Expired { .. }));
    }
}
