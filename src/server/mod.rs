//! A2A server framework — traits and implementations for building A2A agents.
//!
//! Mirrors the Python SDK's server module architecture:
//!
//! - [`AgentExecutor`] trait — implement your agent logic
//! - [`RequestContext`] — execution context with task IDs, message, metadata
//! - [`ServerCallContext`] — per-request context with extensions and state
//! - [`RequestContextBuilder`] trait + [`SimpleRequestContextBuilder`] — build contexts
//! - [`TaskStore`] trait + [`InMemoryTaskStore`] — task persistence
//! - [`TaskUpdater`] — thread-safe task state transition helper
//! - [`EventQueue`] — broadcast channel for streaming events
//! - [`QueueManager`] trait + [`InMemoryQueueManager`] — per-task queue management
//! - [`EventConsumer`] — consumes events from a queue (one-shot or streaming)
//! - [`RequestHandler`] trait + [`DefaultRequestHandler`] — JSON-RPC dispatch
//! - [`a2a_router`] — ready-made axum routes for A2A servers
//! - [`TaskLifecycleEngine`] — transition validation, retrying status updates, cancellation
//! - [`ExecutionState`] + [`ExecutionStateCodec`] — pause/resume snapshots
//! - [`SessionStore`] trait + [`InMemorySessionStore`]/[`PersistentSessionStore`] — session metadata
//! - [`CheckpointManager`] + [`CheckpointStrategy`] — HITL checkpoint persistence
//! - [`ReasoningStrategy`] trait + [`EngineRegistry`] — pluggable reasoning engines
//! - [`ReasoningAgentExecutor`] — drives a reasoning strategy with checkpointing and HITL
//! - [`AgentRegistry`] — multi-agent hosting
//! - [`Router`] — agent-name resolution and RPC delegation
//! - [`ExternalAgentProxy`] — forwards the A2A surface to a remote agent
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_rs::server::*;
//! use a2a_rs::types::AgentCard;
//!
//! // 1. Implement your agent logic.
//! struct MyAgent;
//!
//! #[async_trait::async_trait]
//! impl AgentExecutor for MyAgent {
//!     async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> a2a_rs::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.start_work(Some("Processing...")).await?;
//!         // ... do work ...
//!         updater.complete(Some("Done!")).await?;
//!         Ok(())
//!     }
//!
//!     async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> a2a_rs::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.cancel(None).await?;
//!         Ok(())
//!     }
//! }
//!
//! // 2. Wire up the server.
//! let executor: Arc<dyn AgentExecutor> = Arc::new(MyAgent);
//! let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
//! let handler: Arc<dyn RequestHandler> = Arc::new(
//!     DefaultRequestHandler::new(executor, store)
//! );
//!
//! // 3. Create the router and serve.
//! let app = a2a_router(handler, agent_card);
//! ```

pub mod agent_executor;
pub mod axum_integration;
pub mod checkpoint;
pub mod event_queue;
#[cfg(all(feature = "client", feature = "server"))]
pub mod external_agent;
pub mod execution_state;
pub mod executor;
pub mod lifecycle;
pub mod reasoning;
pub mod registry;
pub mod request_handler;
pub mod router;
pub mod session_store;
pub mod task_manager;
pub mod task_store;
pub mod task_updater;

// Re-export key types at the server module level for convenience.
pub use crate::types::SendMessageResponse;
pub use agent_executor::{
    AgentExecutor, RequestContext, RequestContextBuilder, ServerCallContext,
    SimpleRequestContextBuilder,
};
pub use axum_integration::a2a_router;
pub use checkpoint::{should_checkpoint_interval, CheckpointManager, CheckpointStrategy};
pub use event_queue::{
    EventConsumer, EventQueue, InMemoryQueueManager, NoTaskQueue, QueueManager, TaskQueueExists,
};
#[cfg(all(feature = "client", feature = "server"))]
pub use external_agent::ExternalAgentProxy;
pub use execution_state::{
    CheckpointMetadata, ExecutionState, ExecutionStateCodec, PendingToolCall, ReasoningSnapshot,
};
pub use executor::ReasoningAgentExecutor;
pub use lifecycle::{is_legal_transition, is_terminal, CancelToken, TaskLifecycleEngine};
pub use reasoning::{
    EchoStrategy, EngineRegistry, ReasoningChunk, ReasoningOutcome, ReasoningStrategy,
    ReasoningStrategyFactory,
};
pub use registry::{AgentRegistry, RegistryEntry, Visibility};
pub use request_handler::{
    CancelTaskParams, DefaultRequestHandler, GetTaskParams, RequestHandler,
    SendMessageConfiguration, SendMessageParams, SubscribeToTaskParams,
};
pub use router::{resolve_agent_name, Router};
pub use session_store::{InMemorySessionStore, PersistentSessionStore, Session, SessionStore};
pub use task_manager::{append_artifact_to_task, TaskEvent, TaskManager};
pub use task_store::{InMemoryTaskStore, TaskListParams, TaskListResponse, TaskStore};
pub use task_updater::TaskUpdater;
