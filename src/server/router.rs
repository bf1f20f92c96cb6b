//! Router — resolves an inbound request's target agent and delegates the
//! full A2A RPC surface to it.
//!
//! Holds a non-owning reference to the [`AgentRegistry`] (the registry owns
//! agents; the router just looks them up), matching the shared-ownership
//! shape this runtime's cross-component references are meant to take.

use std::sync::Arc;

use crate::error::{A2AError, A2AResult};
use crate::types::{AgentCard, StreamResponse, Task};

use super::registry::AgentRegistry;
use super::request_handler::{
    CancelTaskParams, GetTaskParams, SendMessageParams, SubscribeToTaskParams,
};
use super::task_store::{TaskListParams, TaskListResponse};

/// Resolve the target agent name from the pieces of an inbound request,
/// following this precedence chain (first non-empty wins):
///
/// 1. Request metadata key `agent-name`.
/// 2. `contextId` parsed as `<agentName>:<sessionSuffix>` (split on the
///    first `:`, requiring a non-empty prefix).
/// 3. Message metadata field `name`, then `agent_id`.
/// 4. The sole registered agent, if the registry is a singleton.
///
/// Returns `None` if none of the above apply — callers turn that into
/// `InvalidArgument`.
pub fn resolve_agent_name(
    request_metadata: Option<&serde_json::Value>,
    context_id: Option<&str>,
    message_metadata: Option<&serde_json::Value>,
    singleton_agent_id: Option<&str>,
) -> Option<String> {
    if let Some(name) = request_metadata
        .and_then(|m| m.get("agent-name"))
        .and_then(|v| v.as_str())
    {
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    if let Some(ctx) = context_id {
        if let Some((prefix, _suffix)) = ctx.split_once(':') {
            if !prefix.is_empty() {
                return Some(prefix.to_string());
            }
        }
    }

    if let Some(name) = message_metadata
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
    {
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    if let Some(name) = message_metadata
        .and_then(|m| m.get("agent_id"))
        .and_then(|v| v.as_str())
    {
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    singleton_agent_id.map(|s| s.to_string())
}

/// Delegates every A2A RPC to the agent resolved for each request.
pub struct Router {
    registry: Arc<AgentRegistry>,
}

impl Router {
    /// Create a router over the given registry. The router does not own the
    /// registry — it is typically shared (`Arc`) with whatever constructed
    /// the agents in the first place.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the agent for a message-carrying request (`SendMessage`,
    /// `SendStreamingMessage`). Fails with `InvalidArgument` when no
    /// resolution rule applies.
    async fn resolve_for_message(
        &self,
        request_metadata: Option<&serde_json::Value>,
        context_id: Option<&str>,
        message_metadata: Option<&serde_json::Value>,
    ) -> A2AResult<Arc<super::registry::RegistryEntry>> {
        let singleton = self.registry.only_entry().await;
        let name = resolve_agent_name(
            request_metadata,
            context_id,
            message_metadata,
            singleton.as_ref().map(|e| e.id.as_str()),
        )
        .ok_or_else(|| {
            A2AError::invalid_params("could not determine target agent for request")
        })?;

        self.registry
            .get(&name)
            .await
            .ok_or_else(|| A2AError::invalid_params(format!("unknown agent {name:?}")))
    }

    /// Resolve the agent for a task-scoped method (`GetTask`, `CancelTask`,
    /// `TaskSubscription`) that carries no direct agent hint. This only
    /// resolves when the registry is a singleton; otherwise it fails with
    /// `Unimplemented`.
    async fn resolve_for_task_scoped(&self) -> A2AResult<Arc<super::registry::RegistryEntry>> {
        self.registry.only_entry().await.ok_or_else(|| {
            A2AError::unsupported_operation(
                "requires agent specification in multi-agent mode",
            )
        })
    }

    /// Dispatch `message/send`.
    pub async fn send_message(
        &self,
        request_metadata: Option<&serde_json::Value>,
        params: SendMessageParams,
    ) -> A2AResult<crate::types::SendMessageResponse> {
        let entry = self
            .resolve_for_message(
                request_metadata,
                params.message.context_id.as_deref(),
                params.message.metadata.as_ref(),
            )
            .await?;
        entry.handler.on_message_send(params).await
    }

    /// Dispatch `message/stream`.
    pub async fn send_streaming_message(
        &self,
        request_metadata: Option<&serde_json::Value>,
        params: SendMessageParams,
    ) -> A2AResult<tokio::sync::broadcast::Receiver<StreamResponse>> {
        let entry = self
            .resolve_for_message(
                request_metadata,
                params.message.context_id.as_deref(),
                params.message.metadata.as_ref(),
            )
            .await?;
        entry.handler.on_message_send_stream(params).await
    }

    /// Dispatch `tasks/get`.
    pub async fn get_task(&self, params: GetTaskParams) -> A2AResult<Task> {
        let entry = self.resolve_for_task_scoped().await?;
        entry.handler.on_get_task(params).await
    }

    /// Dispatch `tasks/list`.
    pub async fn list_tasks(&self, params: TaskListParams) -> A2AResult<TaskListResponse> {
        let entry = self.resolve_for_task_scoped().await?;
        entry.handler.on_list_tasks(params).await
    }

    /// Dispatch `tasks/cancel`.
    pub async fn cancel_task(&self, params: CancelTaskParams) -> A2AResult<Task> {
        let entry = self.resolve_for_task_scoped().await?;
        entry.handler.on_cancel_task(params).await
    }

    /// Dispatch `tasks/subscribe`.
    pub async fn subscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
    ) -> A2AResult<tokio::sync::broadcast::Receiver<StreamResponse>> {
        let entry = self.resolve_for_task_scoped().await?;
        entry.handler.on_subscribe_to_task(params).await
    }

    /// Dispatch `GetAgentCard`: resolve the target agent the same way
    /// `tasks/get` does (no message is carried on this request), then merge
    /// its config's security schemes into a clone of its static card.
    pub async fn get_agent_card(
        &self,
        request_metadata: Option<&serde_json::Value>,
    ) -> A2AResult<AgentCard> {
        let singleton = self.registry.only_entry().await;
        let name = resolve_agent_name(
            request_metadata,
            None,
            None,
            singleton.as_ref().map(|e| e.id.as_str()),
        )
        .ok_or_else(|| {
            A2AError::invalid_params("could not determine target agent for request")
        })?;

        let entry = self
            .registry
            .get(&name)
            .await
            .ok_or_else(|| A2AError::invalid_params(format!("unknown agent {name:?}")))?;

        Ok(merge_security_into_card(&entry.agent_card, &entry.config))
    }
}

/// Overlay an agent's configured security schemes/requirements onto a clone
/// of its static card. A `None` in `config` leaves the card's own value (if
/// any) untouched rather than clearing it.
fn merge_security_into_card(
    card: &AgentCard,
    config: &crate::config::AgentConfig,
) -> AgentCard {
    let mut merged = card.clone();
    if let Some(schemes) = &config.security_schemes {
        merged.security_schemes = Some(schemes.clone());
    }
    if let Some(security) = &config.security {
        merged.security = Some(security.clone());
    }
    merged
}
