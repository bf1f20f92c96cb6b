//! Agent registry — owns every agent hosted by this runtime for its
//! lifetime and exposes concurrent-safe lookup.
//!
//! Mirrors the locking discipline of [`super::task_store::InMemoryTaskStore`]
//! (a `tokio::sync::RwLock` guarding a `HashMap`) since the access pattern is
//! the same shape: readers-many (route a request) / writers-few (register an
//! agent at startup, or occasionally at runtime).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::AgentConfig;
use crate::types::AgentCard;

use super::request_handler::RequestHandler;

/// Whether an agent is listed in public agent-discovery surfaces. Re-exported
/// here next to the rest of the registry entry tuple `(id, agent, config,
/// visibility)`; the canonical definition lives in [`crate::config::Visibility`].
pub use crate::config::Visibility;

/// A single hosted agent: its id, the request handler that serves its A2A
/// surface, its configuration, and its visibility.
///
/// The registry exclusively owns entries for the runtime's lifetime — the
/// [`super::router::Router`] holds only a non-owning `Arc` reference to the
/// registry itself.
pub struct RegistryEntry {
    /// The registry key this agent is looked up by.
    pub id: String,
    /// The request handler serving this agent's A2A method surface — either
    /// a local [`super::request_handler::DefaultRequestHandler`] or an
    /// [`super::external_agent::ExternalAgentProxy`].
    pub handler: Arc<dyn RequestHandler>,
    /// The static descriptor served for `GetAgentCard`, before
    /// [`super::router::Router::get_agent_card`] merges in `config`'s
    /// security schemes.
    pub agent_card: AgentCard,
    /// The configuration this entry was registered with.
    pub config: AgentConfig,
    /// Public vs. internal listing.
    pub visibility: Visibility,
}

/// Concurrent-safe store of [`RegistryEntry`] values, keyed by agent id.
#[derive(Default)]
pub struct AgentRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its `id`. Overwrites any existing entry with
    /// the same id.
    pub async fn register(&self, entry: RegistryEntry) {
        let id = entry.id.clone();
        let mut entries = self.entries.write().await;
        let replaced = entries.insert(id.clone(), Arc::new(entry)).is_some();
        debug!(agent_id = %id, replaced, "Agent registered");
    }

    /// Look up an agent by id.
    pub async fn get(&self, id: &str) -> Option<Arc<RegistryEntry>> {
        let entries = self.entries.read().await;
        entries.get(id).cloned()
    }

    /// Number of registered agents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns the sole registered agent if exactly one is registered,
    /// otherwise `None`. Used by the router's singleton fallback and by
    /// task-scoped methods that carry no agent hint of their own.
    pub async fn only_entry(&self) -> Option<Arc<RegistryEntry>> {
        let entries = self.entries.read().await;
        if entries.len() == 1 {
            entries.values().next().cloned()
        } else {
            None
        }
    }

    /// Remove an agent from the registry, returning it if present.
    pub async fn remove(&self, id: &str) -> Option<Arc<RegistryEntry>> {
        let mut entries = self.entries.write().await;
        entries.remove(id)
    }
}
