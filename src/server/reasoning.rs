//! Reasoning strategy abstraction — the pluggable seam between the executor
//! and the out-of-scope language-model/tool-calling layer.
//!
//! The strategy itself (prompt composition, tool execution, model calls) is
//! explicitly out of scope; what belongs here is the *contract*
//! the executor drives it through: a lazy, finite sequence of text chunks
//! produced over a channel, terminating either in a final response or a HITL
//! pause.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{A2AError, A2AResult};

use super::execution_state::{PendingToolCall, ReasoningSnapshot};

/// One chunk of assistant output text produced during a reasoning iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningChunk(pub String);

/// Tagged outcome of a single reasoning iteration — `Continue | Pause(..) |
/// Done`, in preference to a sentinel error for signaling a pause. This
/// crate adopts the tagged form since it composes more naturally with
/// `Result` than a distinguished error variant would.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutcome {
    /// The strategy produced more chunks and wants another iteration.
    Continue,
    /// The strategy is blocked on a tool call that needs external (human)
    /// approval before it can proceed.
    Pause(PendingToolCall),
    /// The strategy has emitted its final, tool-free response.
    Done,
}

/// A reasoning strategy drives zero or more iterations of model-plus-tool
/// interaction for a single task, emitting text chunks over `tx` as they are
/// produced and returning the outcome of the iteration it just ran.
///
/// Implementations are expected to be cheap to construct per-request; the
/// executor obtains one instance per `SendMessage`/`SendStreamingMessage`
/// call from a [`ReasoningStrategyFactory`].
#[async_trait]
pub trait ReasoningStrategy: Send + Sync {
    /// Run one reasoning iteration, given the running snapshot (which the
    /// strategy is free to mutate in place — e.g. bumping `iteration`,
    /// appending to `turn_messages`), and a channel to stream text chunks
    /// to. Empty chunks must not be sent — the executor suppresses them on
    /// the wire, but strategies should not rely on that and should filter
    /// at the source.
    async fn step(
        &mut self,
        snapshot: &mut ReasoningSnapshot,
        tx: &mpsc::Sender<ReasoningChunk>,
    ) -> A2AResult<ReasoningOutcome>;

    /// Restore strategy-internal state (if any) from a resumed snapshot.
    /// The default implementation does nothing, which is correct for
    /// strategies that keep no state beyond the `ReasoningSnapshot` itself.
    fn resume(&mut self, _snapshot: &ReasoningSnapshot) {}
}

/// Instantiates a [`ReasoningStrategy`] by the engine name configured for an
/// agent (e.g. `"chain-of-thought"`). Failure to instantiate yields a
/// `StrategyError`, which the executor turns into a FAILED task.
pub trait ReasoningStrategyFactory: Send + Sync {
    /// Build a new strategy instance for `engine_name`.
    fn build(&self, engine_name: &str) -> A2AResult<Box<dyn ReasoningStrategy>>;
}

/// A strategy that emits a single fixed response and finishes — useful as a
/// default/test double, and as the strategy a deployment falls back to when
/// it wants deterministic, tool-free behavior.
pub struct EchoStrategy {
    response: String,
    emitted: bool,
}

impl EchoStrategy {
    /// Create a strategy that responds with `response` on its first
    /// iteration and then signals `Done`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            emitted: false,
        }
    }
}

#[async_trait]
impl ReasoningStrategy for EchoStrategy {
    async fn step(
        &mut self,
        snapshot: &mut ReasoningSnapshot,
        tx: &mpsc::Sender<ReasoningChunk>,
    ) -> A2AResult<ReasoningOutcome> {
        snapshot.iteration += 1;
        if self.emitted {
            return Ok(ReasoningOutcome::Done);
        }
        self.emitted = true;
        if !self.response.is_empty() {
            snapshot.accumulated_response.push_str(&self.response);
            let _ = tx.send(ReasoningChunk(self.response.clone())).await;
        }
        snapshot.final_response_emitted = true;
        Ok(ReasoningOutcome::Done)
    }
}

/// Registry-backed factory mapping engine names to constructor closures.
/// Agents register their reasoning engines here at startup; unregistered
/// names fail instantiation with `StrategyError`.
#[derive(Default)]
pub struct EngineRegistry {
    builders: HashMap<String, Box<dyn Fn() -> Box<dyn ReasoningStrategy> + Send + Sync>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `engine_name`.
    pub fn register(
        &mut self,
        engine_name: impl Into<String>,
        builder: impl Fn() -> Box<dyn ReasoningStrategy> + Send + Sync + 'static,
    ) {
        self.builders.insert(engine_name.into(), Box::new(builder));
    }
}

impl ReasoningStrategyFactory for EngineRegistry {
    fn build(&self, engine_name: &str) -> A2AResult<Box<dyn ReasoningStrategy>> {
        match self.builders.get(engine_name) {
            Some(builder) => Ok(builder()),
            None => Err(A2AError::StrategyError(format!(
                "no reasoning engine registered for {engine_name:?}"
            ))),
        }
    }
}
