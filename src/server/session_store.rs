//! Session store — persistence for per-context conversation state.
//!
//! Mirrors the shape of [`super::task_store::TaskStore`] but keyed by context
//! id rather than task id, and carries the `pending_executions` sub-mapping
//! that the checkpoint manager reads and writes.
//!
//! A session is created on first reference and is never implicitly deleted;
//! its message history and metadata survive across tasks run in the same
//! context.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::A2AResult;
use crate::types::Message;

/// A conversation's durable state, keyed by context id.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// The context id this session represents.
    pub context_id: String,
    /// Ordered message history across all tasks run in this context.
    pub history: Vec<Message>,
    /// Free-form metadata, including the `pending_executions` sub-map.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// When the session was first created.
    pub created_at: String,
    /// When the session was last written to.
    pub updated_at: String,
}

/// Key under which the checkpoint manager stores pending execution snapshots.
pub const PENDING_EXECUTIONS_KEY: &str = "pending_executions";

impl Session {
    fn new(context_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            context_id: context_id.into(),
            history: Vec::new(),
            metadata: serde_json::Map::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Trait for persisting per-context session state.
///
/// Implementations must serialize read-modify-write access to a single
/// session's metadata — concurrent HITL pauses on the same session must not
/// be able to clobber each other's `pending_executions` entry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session by context id, creating it if it doesn't yet exist.
    async fn get_or_create(&self, context_id: &str) -> A2AResult<Session>;

    /// Fetch a session by context id. Returns `None` if never referenced.
    async fn get(&self, context_id: &str) -> A2AResult<Option<Session>>;

    /// Append a message to a session's history, creating the session first
    /// if necessary.
    async fn append_message(&self, context_id: &str, message: Message) -> A2AResult<()>;

    /// Atomically read-modify-write a session's metadata. `f` receives the
    /// current metadata object (empty if the session is new) and returns the
    /// updated value. Implementations must run this under a per-session lock
    /// so concurrent callers cannot lose each other's writes.
    async fn update_metadata(
        &self,
        context_id: &str,
        f: Box<dyn FnOnce(&mut serde_json::Map<String, serde_json::Value>) + Send>,
    ) -> A2AResult<()>;

    /// Whether this store survives process restarts. Async HITL requires a
    /// persistent store; an ephemeral (in-memory) store always returns
    /// `false` here even though it satisfies the trait.
    fn is_persistent(&self) -> bool;
}

/// In-memory session store. Ephemeral — data is lost on restart, and
/// [`SessionStore::is_persistent`] always reports `false`.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Create a new empty in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, context_id: &str) -> A2AResult<Session> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(context_id.to_string())
            .or_insert_with(|| Session::new(context_id));
        Ok(session.clone())
    }

    async fn get(&self, context_id: &str) -> A2AResult<Option<Session>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(context_id).cloned())
    }

    async fn append_message(&self, context_id: &str, message: Message) -> A2AResult<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(context_id.to_string())
            .or_insert_with(|| Session::new(context_id));
        session.history.push(message);
        session.updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    async fn update_metadata(
        &self,
        context_id: &str,
        f: Box<dyn FnOnce(&mut serde_json::Map<String, serde_json::Value>) + Send>,
    ) -> A2AResult<()> {
        // Holding the single mutex across the whole read-modify-write makes
        // this atomic per session id, same as every other session.
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(context_id.to_string())
            .or_insert_with(|| Session::new(context_id));
        f(&mut session.metadata);
        session.updated_at = Utc::now().to_rfc3339();
        debug!(context_id = %context_id, "Session metadata updated");
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Wraps any [`SessionStore`] and reports it as persistent, regardless of the
/// inner store's own backing. Used to adapt a durable store (file, database)
/// that doesn't otherwise implement a capability flag.
///
/// Distinguishing a durable store from an ephemeral one matters for deciding
/// whether async HITL checkpoints are safe to use at all — here the flag is
/// modeled explicitly since no externally-backed store ships with this
/// crate.
pub struct PersistentSessionStore<S> {
    inner: Arc<S>,
}

impl<S> PersistentSessionStore<S> {
    /// Wrap `inner`, declaring it persistent for HITL capability checks.
    pub fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for PersistentSessionStore<S> {
    async fn get_or_create(&self, context_id: &str) -> A2AResult<Session> {
        self.inner.get_or_create(context_id).await
    }

    async fn get(&self, context_id: &str) -> A2AResult<Option<Session>> {
        self.inner.get(context_id).await
    }

    async fn append_message(&self, context_id: &str, message: Message) -> A2AResult<()> {
        self.inner.append_message(context_id, message).await
    }

    async fn update_metadata(
        &self,
        context_id: &str,
        f: Box<dyn FnOnce(&mut serde_json::Map<String, serde_json::Value>) + Send>,
    ) -> A2AResult<()> {
        self.inner.update_metadata(context_id, f).await
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
