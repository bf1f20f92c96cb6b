//! Task lifecycle engine — validates state transitions and drives status
//! updates with bounded retry.
//!
//! Unlike [`super::task_updater::TaskUpdater`] (which only guards against
//! mutating an already-terminal task), this engine enforces the **full**
//! legal-transition graph at its own boundary, independent of whatever the
//! underlying [`TaskStore`] does. It is the seam callers should go through
//! when the exact transition matters — e.g. rejecting a `SUBMITTED →
//! INPUT_REQUIRED` jump that `TaskUpdater` would otherwise allow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, Task, TaskState, TaskStatus};

use super::event_queue::{EventQueue, QueueManager};
use super::task_store::TaskStore;

/// Cooperative cancellation signal, built from `tokio::sync::Notify` so no
/// additional crate is needed beyond what's already pulled in for
/// broadcast/mutex support.
///
/// A lightweight stand-in for a cancellation context every suspension point
/// (retry backoff, reasoning iteration) can accept without committing to a
/// particular async runtime's cancellation-context type.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<(AtomicBool, Notify)>);

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every current and future waiter.
    pub fn cancel(&self) {
        self.0 .0.store(true, Ordering::SeqCst);
        self.0 .1.notify_waiters();
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0 .0.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled. Resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0 .1.notified().await;
    }
}

/// Validates task status transitions and drives retried status updates,
/// independent of the underlying [`TaskStore`]'s own guarantees.
pub struct TaskLifecycleEngine {
    task_store: Arc<dyn TaskStore>,
    queue_manager: Arc<dyn QueueManager>,
}

/// Returns `true` if moving from `from` to `to` is a legal transition per
/// the task state machine:
///
/// - `SUBMITTED` → `{WORKING, CANCELLED, FAILED}`
/// - `WORKING` → `{INPUT_REQUIRED, COMPLETED, CANCELLED, FAILED}`
/// - `INPUT_REQUIRED` → `{WORKING, CANCELLED, FAILED}`
/// - `COMPLETED`, `CANCELLED`, `FAILED` are terminal — no transition out.
pub fn is_legal_transition(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    matches!(
        (from, to),
        (Submitted, Working)
            | (Submitted, Canceled)
            | (Submitted, Failed)
            | (Working, InputRequired)
            | (Working, Completed)
            | (Working, Canceled)
            | (Working, Failed)
            | (InputRequired, Working)
            | (InputRequired, Canceled)
            | (InputRequired, Failed)
    )
}

/// Returns `true` if `state` has no legal outbound transition.
pub fn is_terminal(state: TaskState) -> bool {
    matches!(
        state,
        TaskState::Completed | TaskState::Canceled | TaskState::Failed
    )
}

impl TaskLifecycleEngine {
    /// Create a lifecycle engine over the given task store and queue manager.
    pub fn new(task_store: Arc<dyn TaskStore>, queue_manager: Arc<dyn QueueManager>) -> Self {
        Self {
            task_store,
            queue_manager,
        }
    }

    /// Create a new task in `SUBMITTED` state. Assigns `id =
    /// task-<monotonic-nanosecond-timestamp>` unless `task_id` is supplied.
    pub async fn create_task(
        &self,
        context_id: Option<String>,
        initial_message: Message,
        task_id: Option<String>,
    ) -> A2AResult<Task> {
        let id = task_id.unwrap_or_else(generate_task_id);
        let context_id = context_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let task = Task {
            id: id.clone(),
            context_id,
            kind: "task".to_string(),
            status: TaskStatus {
                state: TaskState::Submitted,
                message: None,
                timestamp: Some(chrono::Utc::now().to_rfc3339()),
            },
            artifacts: None,
            history: Some(vec![initial_message]),
            metadata: None,
        };

        self.task_store.save(task.clone()).await?;
        debug!(task_id = %id, "Task created");
        Ok(task)
    }

    /// Validate and apply a status transition. Reads the current state,
    /// checks it against [`is_legal_transition`], and fails with
    /// `InvalidTransition` on violation — this check happens here, not in
    /// the underlying store.
    pub async fn update_status(
        &self,
        task_id: &str,
        new_state: TaskState,
        message: Option<Message>,
    ) -> A2AResult<Task> {
        let mut task = self
            .task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id))?;

        let current_state = task.status.state;
        if !is_legal_transition(current_state, new_state) {
            return Err(A2AError::invalid_transition(
                task_id,
                format!("{current_state:?}"),
                format!("{new_state:?}"),
            ));
        }

        if let Some(ref current_msg) = task.status.message {
            let history = task.history.get_or_insert_with(Vec::new);
            history.push(current_msg.clone());
        }

        task.status = TaskStatus {
            state: new_state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        };

        self.task_store.save(task.clone()).await?;
        debug!(task_id = %task_id, from = ?current_state, to = ?new_state, "Status transition applied");
        Ok(task)
    }

    /// `update_status` wrapped in bounded exponential backoff (base 100ms,
    /// doubling, three attempts). Does not retry validation errors — an
    /// `InvalidTransition` is surfaced immediately, since no amount of
    /// retrying makes an illegal transition legal. `cancel`, if cancelled
    /// mid-retry, aborts the loop with `A2AError::Cancelled`.
    pub async fn update_status_with_retry(
        &self,
        task_id: &str,
        new_state: TaskState,
        message: Option<Message>,
        cancel: &CancelToken,
    ) -> A2AResult<Task> {
        const MAX_ATTEMPTS: u32 = 3;
        const BASE_DELAY_MS: u64 = 100;

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(A2AError::Cancelled(format!(
                    "update_status_with_retry for task {task_id} cancelled"
                )));
            }

            match self
                .update_status(task_id, new_state, message.clone())
                .await
            {
                Ok(task) => return Ok(task),
                Err(e) if e.is_invalid_transition() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        warn!(task_id = %task_id, attempts = attempt, error = %e, "Status update exhausted retries");
                        return Err(e);
                    }
                    let delay = Duration::from_millis(BASE_DELAY_MS * (1 << (attempt - 1)));
                    warn!(task_id = %task_id, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying status update");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(A2AError::Cancelled(format!(
                                "update_status_with_retry for task {task_id} cancelled during backoff"
                            )));
                        }
                    }
                }
            }
        }
    }

    /// Append a message to a task's history. History is append-only —
    /// terminal state does not block appends here; callers that need the
    /// terminal guard should route mutation through status transitions.
    pub async fn add_message(&self, task_id: &str, message: Message) -> A2AResult<Task> {
        let mut task = self
            .task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id))?;

        task.history.get_or_insert_with(Vec::new).push(message);
        self.task_store.save(task.clone()).await?;
        Ok(task)
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, task_id: &str) -> A2AResult<Task> {
        self.task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id))
    }

    /// Cancel a task. Fails with `TaskNotCancelable` if the task is already
    /// terminal (cancellation out of a terminal state is never legal).
    pub async fn cancel_task(&self, task_id: &str) -> A2AResult<Task> {
        let task = self.get_task(task_id).await?;
        if is_terminal(task.status.state) {
            return Err(A2AError::task_not_cancelable(format!(
                "task {task_id} is already in terminal state {:?}",
                task.status.state
            )));
        }
        self.update_status(task_id, TaskState::Canceled, None).await
    }

    /// Obtain the event queue to subscribe to for a task's lifecycle events.
    /// Monotonic delivery up to a terminal `final=true` event is the queue
    /// manager's responsibility (see [`EventQueue`]); this just resolves the
    /// queue for the named task, creating one if none exists yet.
    pub async fn subscribe(&self, task_id: &str) -> EventQueue {
        self.queue_manager.create_or_tap(task_id).await
    }
}

/// Generates a `task-<monotonic-nanosecond-timestamp>` identifier.
fn generate_task_id() -> String {
    format!("task-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::event_queue::InMemoryQueueManager;
    use crate::server::task_store::InMemoryTaskStore;
    use crate::types::{Part, Role};

    fn engine() -> TaskLifecycleEngine {
        TaskLifecycleEngine::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(InMemoryQueueManager::new()),
        )
    }

    fn user_message(text: &str) -> Message {
        Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::User,
            kind: "message".to_string(),
            parts: vec![Part::text(text)],
            context_id: None,
            task_id: None,
            metadata: None,
            extensions: None,
            reference_task_ids: None,
        }
    }

    #[test]
    fn legal_transition_table_matches_spec() {
        use TaskState::*;
        assert!(is_legal_transition(Submitted, Working));
        assert!(is_legal_transition(Submitted, Canceled));
        assert!(is_legal_transition(Submitted, Failed));
        assert!(!is_legal_transition(Submitted, Completed));
        assert!(!is_legal_transition(Submitted, InputRequired));

        assert!(is_legal_transition(Working, InputRequired));
        assert!(is_legal_transition(Working, Completed));
        assert!(is_legal_transition(Working, Canceled));
        assert!(is_legal_transition(Working, Failed));

        assert!(is_legal_transition(InputRequired, Working));
        assert!(is_legal_transition(InputRequired, Canceled));
        assert!(is_legal_transition(InputRequired, Failed));
        assert!(!is_legal_transition(InputRequired, Completed));

        for terminal in [Completed, Canceled, Failed] {
            for to in [Submitted, Working, Completed, Canceled, Failed, InputRequired] {
                assert!(!is_legal_transition(terminal, to));
            }
        }
    }

    #[tokio::test]
    async fn create_task_starts_submitted() {
        let engine = engine();
        let task = engine
            .create_task(None, user_message("hi"), None)
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Submitted);
        assert!(task.id.starts_with("task-"));
    }

    #[tokio::test]
    async fn update_status_rejects_illegal_transition() {
        let engine = engine();
        let task = engine
            .create_task(None, user_message("hi"), None)
            .await
            .unwrap();

        let err = engine
            .update_status(&task.id, TaskState::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, A2AError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn update_status_allows_legal_transition() {
        let engine = engine();
        let task = engine
            .create_task(None, user_message("hi"), None)
            .await
            .unwrap();

        let updated = engine
            .update_status(&task.id, TaskState::Working, None)
            .await
            .unwrap();
        assert_eq!(updated.status.state, TaskState::Working);
    }

    #[tokio::test]
    async fn cancel_task_fails_once_terminal() {
        let engine = engine();
        let task = engine
            .create_task(None, user_message("hi"), None)
            .await
            .unwrap();
        engine
            .update_status(&task.id, TaskState::Working, None)
            .await
            .unwrap();
        engine
            .update_status(&task.id, TaskState::Completed, None)
            .await
            .unwrap();

        let err = engine.cancel_task(&task.id).await.unwrap_err();
        assert!(matches!(err, A2AError::TaskNotCancelable { .. }));
    }

    #[tokio::test]
    async fn update_status_with_retry_does_not_retry_invalid_transition() {
        let engine = engine();
        let task = engine
            .create_task(None, user_message("hi"), None)
            .await
            .unwrap();
        let cancel = CancelToken::new();

        let err = engine
            .update_status_with_retry(&task.id, TaskState::Completed, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, A2AError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn update_status_with_retry_honors_cancellation() {
        let engine = engine();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = engine
            .update_status_with_retry("nonexistent", TaskState::Working, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, A2AError::Cancelled(_)));
    }
}
