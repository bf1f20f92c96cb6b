//! Reasoning agent executor — the concrete [`AgentExecutor`] that drives a
//! [`ReasoningStrategy`] to completion, with bounded admission, HITL
//! pause/resume, and checkpointing wired in.
//!
//! This is the executor a hosted agent actually runs; `EchoAgent`-style
//! executors exist only as minimal illustrations of the trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::{A2AError, A2AResult};
use crate::types::Part;

use super::agent_executor::{AgentExecutor, RequestContext};
use super::checkpoint::CheckpointManager;
use super::event_queue::EventQueue;
use super::execution_state::{ExecutionState, ReasoningSnapshot};
use super::lifecycle::CancelToken;
use super::reasoning::{ReasoningChunk, ReasoningOutcome, ReasoningStrategyFactory};
use super::session_store::SessionStore;
use super::task_updater::TaskUpdater;

/// Drives one agent's reasoning strategy for every task routed to it.
///
/// Holds the agent's static configuration, the factory that instantiates a
/// fresh [`ReasoningStrategy`] per execution, the session store backing HITL
/// checkpoints, and an optional [`Semaphore`] bounding concurrent executions
/// (`Task.TaskWorkers` in configuration; `None` means unbounded).
pub struct ReasoningAgentExecutor {
    config: AgentConfig,
    strategy_factory: Arc<dyn ReasoningStrategyFactory>,
    session_store: Arc<dyn SessionStore>,
    checkpoint_manager: CheckpointManager,
    admission: Option<Arc<Semaphore>>,
    cancel_tokens: Mutex<HashMap<String, CancelToken>>,
}

impl ReasoningAgentExecutor {
    /// Build an executor for `config`, backed by `strategy_factory` for
    /// reasoning engines and `session_store` for HITL session metadata.
    pub fn new(
        config: AgentConfig,
        strategy_factory: Arc<dyn ReasoningStrategyFactory>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let admission = config.task.task_workers.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let checkpoint_manager =
            CheckpointManager::new(Arc::clone(&session_store), config.task.resume_timeout_secs);
        Self {
            config,
            strategy_factory,
            session_store,
            checkpoint_manager,
            admission,
            cancel_tokens: Mutex::new(HashMap::new()),
        }
    }

    fn should_checkpoint_on_event(&self) -> bool {
        self.config.task.enable_checkpointing
            && self.config.task.checkpoint_strategy.checkpoints_on_event()
            && self.checkpoint_manager.is_usable()
    }

    fn should_checkpoint_on_interval(&self, iteration: u64) -> bool {
        self.config.task.enable_checkpointing
            && self.config.task.checkpoint_strategy.checkpoints_on_interval()
            && self.checkpoint_manager.is_usable()
            && super::checkpoint::should_checkpoint_interval(
                iteration,
                self.config.task.checkpoint_interval,
            )
    }

    /// Forward reasoning chunks to the task as they arrive, accumulating
    /// them into a single streamed artifact (mirrors the echo executor's
    /// one-artifact-per-response shape, but appended incrementally).
    async fn stream_chunks(
        updater: Arc<TaskUpdater>,
        mut rx: mpsc::Receiver<ReasoningChunk>,
    ) {
        let mut first = true;
        while let Some(chunk) = rx.recv().await {
            if chunk.0.is_empty() {
                continue;
            }
            if let Err(e) = updater
                .add_artifact(
                    vec![Part::text(chunk.0)],
                    Some("reasoning-response".to_string()),
                    Some("reasoning-response".to_string()),
                    None,
                    Some(!first),
                    None,
                    None,
                )
                .await
            {
                warn!(error = %e, "Failed to publish reasoning chunk");
                break;
            }
            first = false;
        }
    }

    async fn run_strategy(
        &self,
        updater: &Arc<TaskUpdater>,
        mut strategy: Box<dyn super::reasoning::ReasoningStrategy>,
        mut snapshot: ReasoningSnapshot,
        context_id: &str,
        task_id: &str,
        user_query: &str,
        cancel: &CancelToken,
    ) -> A2AResult<()> {
        let max_iterations = self.config.reasoning.max_iterations as u64;

        loop {
            if cancel.is_cancelled() {
                return Err(A2AError::Cancelled(format!("task {task_id} cancelled")));
            }

            let (tx, rx) = mpsc::channel(32);
            let stream_updater = Arc::clone(updater);
            let forward = tokio::spawn(Self::stream_chunks(stream_updater, rx));

            let outcome = strategy.step(&mut snapshot, &tx).await;
            drop(tx);
            let _ = forward.await;

            let outcome = outcome?;

            if self.should_checkpoint_on_interval(snapshot.iteration) {
                let mut state =
                    ExecutionState::new(task_id, context_id, user_query);
                state.reasoning = snapshot.clone();
                self.checkpoint_manager.save(state).await?;
                debug!(task_id, iteration = snapshot.iteration, "Interval checkpoint saved");
            }

            match outcome {
                ReasoningOutcome::Continue => {
                    if snapshot.iteration >= max_iterations {
                        warn!(task_id, max_iterations, "Reasoning hit max iteration bound");
                        updater
                            .complete_with_text(&snapshot.accumulated_response)
                            .await?;
                        return Ok(());
                    }
                    continue;
                }
                ReasoningOutcome::Pause(pending_tool_call) => {
                    let mut state = ExecutionState::new(task_id, context_id, user_query);
                    state.reasoning = snapshot;
                    state.pending_tool_call = Some(pending_tool_call);

                    if self.should_checkpoint_on_event() {
                        self.checkpoint_manager.save(state).await?;
                    } else if !self.session_store.is_persistent()
                        && self.config.task.hitl_mode != crate::config::HitlMode::Blocking
                    {
                        warn!(
                            task_id,
                            "HITL pause requested async semantics but the session store is \
                             ephemeral — downgrading to blocking"
                        );
                    }

                    updater.requires_input(None, false).await?;
                    return Ok(());
                }
                ReasoningOutcome::Done => {
                    if self.config.task.enable_checkpointing {
                        let _ = self.checkpoint_manager.clear(context_id, task_id).await;
                    }
                    updater
                        .complete_with_text(&snapshot.accumulated_response)
                        .await?;
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait]
impl AgentExecutor for ReasoningAgentExecutor {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let task_id = context.task_id.clone();
        let context_id = context.context_id.clone();
        let user_query = context.get_user_input("\n");

        if user_query.is_empty() {
            return Err(A2AError::invalid_params(
                "message contains no text content to reason over",
            ));
        }

        let _permit = match &self.admission {
            Some(sem) => Some(Arc::clone(sem).acquire_owned().await.map_err(|_| {
                A2AError::ExecutionError("worker pool semaphore closed".to_string())
            })?),
            None => None,
        };

        let cancel = CancelToken::new();
        {
            let mut tokens = self.cancel_tokens.lock().await;
            tokens.insert(task_id.clone(), cancel.clone());
        }

        let updater = Arc::new(TaskUpdater::new(
            event_queue,
            task_id.clone(),
            context_id.clone(),
        ));

        self.session_store.get_or_create(&context_id).await?;
        if let Some(message) = context.message.clone() {
            let _ = self.session_store.append_message(&context_id, message).await;
        }

        let resumed = if self.config.task.auto_resume
            || (self.config.task.auto_resume_hitl && self.config.task.enable_checkpointing)
        {
            match self.checkpoint_manager.load(&context_id, &task_id).await {
                Ok(state) => Some(state),
                Err(A2AError::TaskNotFound { .. }) => None,
                Err(A2AError::Expired { .. }) => {
                    debug!(task_id = %task_id, "Checkpoint expired — starting fresh");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let mut strategy = self.strategy_factory.build(&self.config.reasoning.engine)?;

        let snapshot = match resumed {
            Some(state) => {
                strategy.resume(&state.reasoning);
                state.reasoning
            }
            None => {
                updater.start_work(None).await?;
                ReasoningSnapshot {
                    original_query: user_query.clone(),
                    agent_name: self.config.id.clone(),
                    ..ReasoningSnapshot::default()
                }
            }
        };

        let result = self
            .run_strategy(
                &updater,
                strategy,
                snapshot,
                &context_id,
                &task_id,
                &user_query,
                &cancel,
            )
            .await;

        self.cancel_tokens.lock().await.remove(&task_id);

        if let Err(ref e) = result {
            if !matches!(e, A2AError::Cancelled(_)) {
                let _ = updater
                    .failed(Some(updater.new_agent_message(
                        vec![Part::text(format!("Agent execution failed: {e}"))],
                        None,
                    )))
                    .await;
            }
        }

        result
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let token = {
            let tokens = self.cancel_tokens.lock().await;
            tokens.get(&context.task_id).cloned()
        };

        if let Some(token) = token {
            token.cancel();
        }

        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}
