//! Runtime configuration shapes.
//!
//! Parsing config from a file or environment is explicitly out of scope —
//! these types only
//! define the shape config is expected to arrive in, deserialized with
//! `serde` the same way every other wire type in this crate is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::server::checkpoint::CheckpointStrategy;
use crate::types::SecurityScheme;

/// `Task.HITL.Mode` — whether human-in-the-loop pauses use async
/// (persisted, resumable-later) or blocking (synchronous) semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitlMode {
    /// Use async HITL if a persistent session store is configured, else
    /// fall back to blocking. This is the default.
    Auto,
    /// Always pause asynchronously, persisting a checkpoint for later resume.
    Async,
    /// Never persist a checkpoint; block the caller until resolved.
    Blocking,
}

impl Default for HitlMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// `Visibility` — whether an agent is listed in public agent-discovery
/// surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed in public discovery surfaces.
    Public,
    /// Reachable only by direct routing, not listed.
    Internal,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

/// Reasoning-related configuration for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Name of the reasoning engine to instantiate (e.g. `"chain-of-thought"`).
    pub engine: String,
    /// Upper bound on reasoning iterations before the executor stops and
    /// returns whatever response has accumulated so far.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

/// Task/checkpoint-related configuration for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Whether checkpointing is enabled at all for this agent.
    #[serde(default)]
    pub enable_checkpointing: bool,
    /// Checkpoint trigger policy, serialized as `"event" | "interval" | "hybrid"`.
    #[serde(default = "default_checkpoint_strategy", with = "checkpoint_strategy_serde")]
    pub checkpoint_strategy: CheckpointStrategy,
    /// `N` in "checkpoint every Nth iteration" when the strategy is
    /// `interval` or `hybrid`. `N <= 0` disables interval checkpointing.
    #[serde(default)]
    pub checkpoint_interval: i64,
    /// Whether a resumable snapshot found on a new request should be
    /// automatically resumed rather than starting a fresh task.
    #[serde(default)]
    pub auto_resume: bool,
    /// Whether HITL pauses specifically should auto-resume.
    #[serde(default)]
    pub auto_resume_hitl: bool,
    /// Seconds after which a checkpoint is considered expired on resume.
    /// `<= 0` disables expiry.
    #[serde(default)]
    pub resume_timeout_secs: i64,
    /// HITL pause behavior.
    #[serde(default)]
    pub hitl_mode: HitlMode,
    /// Bounded worker pool capacity for non-blocking `SendMessage`
    /// dispatch. `None` means unbounded (no admission control).
    #[serde(default)]
    pub task_workers: Option<usize>,
}

fn default_checkpoint_strategy() -> CheckpointStrategy {
    CheckpointStrategy::Event
}

mod checkpoint_strategy_serde {
    use super::CheckpointStrategy;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &CheckpointStrategy, s: S) -> Result<S::Ok, S::Error> {
        let str_value = match value {
            CheckpointStrategy::Event => "event",
            CheckpointStrategy::Interval => "interval",
            CheckpointStrategy::Hybrid => "hybrid",
        };
        s.serialize_str(str_value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CheckpointStrategy, D::Error> {
        let raw = String::deserialize(d)?;
        CheckpointStrategy::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown checkpoint strategy {raw:?}")))
    }
}

/// Credentials for authenticating to a proxied external agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCredentials {
    /// Authentication scheme, e.g. `"bearer"`, `"apiKey"`, `"basic"`.
    #[serde(rename = "Type")]
    pub kind: String,
    /// Bearer token, when `kind == "bearer"`.
    #[serde(default)]
    pub token: Option<String>,
    /// API key, when `kind == "apiKey"`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

/// External-agent proxy configuration (`Type="a2a"` entries in the registry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Always `"a2a"` for the one proxy type this runtime understands.
    #[serde(rename = "Type")]
    pub kind: String,
    /// Base URL of the remote A2A endpoint.
    pub url: String,
    /// Agent id on the remote side to substitute on outbound calls.
    pub target_agent_id: String,
    /// Credentials used to authenticate outbound calls.
    #[serde(default)]
    pub credentials: Option<ProxyCredentials>,
}

/// Full per-agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Registry id this config applies to.
    pub id: String,
    /// Reasoning engine configuration.
    pub reasoning: ReasoningConfig,
    /// Task lifecycle / checkpoint configuration.
    #[serde(default)]
    pub task: TaskConfig,
    /// Identifier resolved to a `SessionStore` instance by the host
    /// application; this crate only carries the identifier.
    #[serde(default)]
    pub session_store: Option<String>,
    /// Public vs. internal listing.
    #[serde(default)]
    pub visibility: Visibility,
    /// Set when this registry entry is a proxy to a remote agent rather
    /// than a locally executed one.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Named security scheme definitions to merge into this agent's served
    /// card, keyed the same way as `AgentCard.security_schemes`. `None`
    /// leaves the card's own schemes (if any) untouched.
    #[serde(default)]
    pub security_schemes: Option<HashMap<String, SecurityScheme>>,
    /// Security requirements to merge into this agent's served card,
    /// shaped like `AgentCard.security` (scheme name to required scopes).
    #[serde(default)]
    pub security: Option<Vec<HashMap<String, Vec<String>>>>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            enable_checkpointing: false,
            checkpoint_strategy: CheckpointStrategy::Event,
            checkpoint_interval: 0,
            auto_resume: false,
            auto_resume_hitl: false,
            resume_timeout_secs: 0,
            hitl_mode: HitlMode::Auto,
            task_workers: None,
        }
    }
}

/// Runtime-wide configuration: the set of configured agents plus any
/// process-global defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Configuration for every agent hosted by this runtime.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// Decides whether async HITL should actually be used for an agent, given
/// its configured mode and whether the attached session store is
/// persistent.
///
/// - `Blocking` never uses async HITL.
/// - `Async` uses it only if `session_store_is_persistent`; if not, callers
///   must downgrade to blocking with a warning (the decision to actually
///   log that warning lives in the executor, not here).
/// - `Auto` uses async HITL iff the store is persistent.
pub fn should_use_async_hitl(mode: HitlMode, session_store_is_persistent: bool) -> bool {
    match mode {
        HitlMode::Blocking => false,
        HitlMode::Async | HitlMode::Auto => session_store_is_persistent,
    }
}
