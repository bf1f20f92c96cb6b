//! Execution-state snapshots — serializable scratchpad for in-flight reasoning.
//!
//! These types capture enough of a reasoning loop's state to resume it later,
//! either after a human-in-the-loop pause or after a crash. They are
//! deliberately untyped at the edges (`serde_json::Value` argument maps) since
//! the reasoning layer that produces them is out of scope here — we only
//! specify the JSON shape that must round-trip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A tool invocation the reasoning layer is waiting on, typically because it
/// requires human approval before the runtime will execute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Arguments to pass to the tool, as a JSON object.
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

/// Metadata describing when and why a checkpoint was taken.
///
/// Missing entirely from older snapshots — defaults to empty fields so that
/// pre-checkpoint-metadata snapshots still deserialize (see
/// [`ExecutionState`]'s `Default` derive on this type).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Logical phase the reasoning loop was in (e.g. `"tool-call"`).
    #[serde(default)]
    pub phase: String,
    /// Checkpoint trigger type (e.g. `"event"`, `"interval"`).
    #[serde(default)]
    pub r#type: String,
    /// RFC 3339 timestamp the checkpoint was taken at. Empty/absent means
    /// "no timestamp", which [`is_expired`](ExecutionState::is_expired)
    /// treats as never expired.
    #[serde(default)]
    pub timestamp: String,
}

/// The reasoning loop's transient scratchpad at the moment of a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSnapshot {
    /// Number of reasoning iterations completed so far.
    #[serde(default)]
    pub iteration: u64,
    /// Cumulative token usage across all iterations.
    #[serde(default)]
    pub total_tokens: u64,
    /// Full message history prior to the current turn.
    #[serde(default)]
    pub prior_history: Vec<serde_json::Value>,
    /// Messages added during the current turn (not yet committed to task history).
    #[serde(default)]
    pub turn_messages: Vec<serde_json::Value>,
    /// Assistant response text accumulated so far this turn.
    #[serde(default)]
    pub accumulated_response: String,
    /// Tool calls requested during the first iteration of this turn.
    #[serde(default)]
    pub first_iteration_tool_calls: Vec<serde_json::Value>,
    /// Whether a final (tool-free) response has already been emitted.
    #[serde(default)]
    pub final_response_emitted: bool,
    /// The original user query that started this task.
    #[serde(default)]
    pub original_query: String,
    /// Name of the agent driving this reasoning loop.
    #[serde(default)]
    pub agent_name: String,
    /// Names of any sub-agents this agent may delegate to.
    #[serde(default)]
    pub sub_agent_names: Vec<String>,
    /// Whether intermediate "thinking" content should be surfaced to the client.
    #[serde(default)]
    pub show_thinking: bool,
}

/// A serializable snapshot of one task's in-flight reasoning, suitable for
/// persisting under `Session.metadata.pending_executions[taskID]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// The task this snapshot belongs to.
    pub task_id: String,
    /// The session (context) this task belongs to.
    pub context_id: String,
    /// The user query that started the task.
    pub user_query: String,
    /// The reasoning scratchpad.
    pub reasoning: ReasoningSnapshot,
    /// The tool call the reasoning layer is blocked on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tool_call: Option<PendingToolCall>,
    /// Checkpoint provenance metadata.
    #[serde(default)]
    pub checkpoint: CheckpointMetadata,
}

impl ExecutionState {
    /// Create a fresh execution state for a newly started task.
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            user_query: user_query.into(),
            reasoning: ReasoningSnapshot::default(),
            pending_tool_call: None,
            checkpoint: CheckpointMetadata::default(),
        }
    }

    /// A snapshot with a pending tool call implies the task is, or should
    /// become, `INPUT_REQUIRED`.
    pub fn requires_input(&self) -> bool {
        self.pending_tool_call.is_some()
    }

    /// Returns `true` if this snapshot's checkpoint timestamp is older than
    /// `resume_timeout_secs` (when > 0). A zero/absent timestamp is treated
    /// as "not expired" for backward compatibility with pre-metadata
    /// snapshots.
    pub fn is_expired(&self, resume_timeout_secs: i64) -> bool {
        if resume_timeout_secs <= 0 {
            return false;
        }
        if self.checkpoint.timestamp.is_empty() {
            return false;
        }
        let Ok(taken_at) = chrono::DateTime::parse_from_rfc3339(&self.checkpoint.timestamp) else {
            return false;
        };
        let age = chrono::Utc::now().signed_duration_since(taken_at.with_timezone(&chrono::Utc));
        age.num_seconds() > resume_timeout_secs
    }
}

/// Serializes an [`ExecutionState`] to the JSON-shaped mapping used for
/// session-metadata persistence, and back.
///
/// This is a thin wrapper over `serde_json` — the "codec" is the contract
/// that the result round-trips (up to numeric normalization, since JSON has
/// no integer/float distinction once re-parsed from a generic `Value`).
pub struct ExecutionStateCodec;

impl ExecutionStateCodec {
    /// Encode an execution state to its JSON representation.
    pub fn encode(state: &ExecutionState) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(state)
    }

    /// Decode an execution state from its JSON representation.
    pub fn decode(value: &serde_json::Value) -> serde_json::Result<ExecutionState> {
        serde_json::from_value(value.clone())
    }
}
