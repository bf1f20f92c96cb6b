//! External agent proxy — forwards every A2A RPC for a registry entry to a
//! remote endpoint instead of executing locally.
//!
//! The proxy owns its transport (an [`A2AClient`]), substitutes the remote
//! agent id on every outbound call, and rejects the RPCs that cannot be
//! meaningfully forwarded across a proxy boundary (push notifications).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::client::A2AClient;
use crate::error::{A2AError, A2AResult};
use crate::types::{StreamResponse, Task};

use super::request_handler::{
    CancelTaskParams, GetTaskParams, RequestHandler, SendMessageParams, SubscribeToTaskParams,
};
use super::task_store::{TaskListParams, TaskListResponse};

/// A registry entry that forwards its A2A surface to a remote agent.
///
/// Holds the local registry id (used for routing on this side), the remote
/// agent id (substituted into every outbound call), and the transport
/// client discovered via the remote's advertised agent card.
pub struct ExternalAgentProxy {
    local_agent_id: String,
    remote_agent_id: String,
    client: A2AClient,
}

impl ExternalAgentProxy {
    /// Wrap a transport client as a proxy for `remote_agent_id`, reachable
    /// locally under `local_agent_id`.
    pub fn new(local_agent_id: impl Into<String>, remote_agent_id: impl Into<String>, client: A2AClient) -> Self {
        Self {
            local_agent_id: local_agent_id.into(),
            remote_agent_id: remote_agent_id.into(),
            client,
        }
    }

    /// The registry key this proxy is routed under.
    pub fn local_agent_id(&self) -> &str {
        &self.local_agent_id
    }

    /// The agent id substituted into outbound calls to the remote endpoint.
    pub fn remote_agent_id(&self) -> &str {
        &self.remote_agent_id
    }

    /// Release the underlying transport. Mirrors `A2AClient::close`.
    pub async fn close(self) -> A2AResult<()> {
        self.client.close().await
    }

    /// Stamp the remote agent id into request metadata under the same
    /// `agent-name` key the router's own resolution precedence looks at
    /// first (see [`super::router::resolve_agent_name`]), so the remote
    /// endpoint routes the forwarded call to the right agent regardless of
    /// what this side's registry key was.
    fn remote_request_metadata(&self, existing: &Option<serde_json::Value>) -> Option<serde_json::Value> {
        let mut map = match existing {
            Some(serde_json::Value::Object(m)) => m.clone(),
            _ => serde_json::Map::new(),
        };
        map.insert(
            "agent-name".to_string(),
            serde_json::Value::String(self.remote_agent_id.clone()),
        );
        Some(serde_json::Value::Object(map))
    }

    fn to_wire_params(&self, params: &SendMessageParams) -> crate::types::SendMessageParams {
        crate::types::SendMessageParams {
            message: params.message.clone(),
            configuration: params.configuration.as_ref().map(|c| {
                crate::types::SendMessageConfiguration {
                    accepted_output_modes: c.accepted_output_modes.clone(),
                    push_notification_config: None,
                    history_length: c.history_length.map(|h| h as i32),
                    blocking: c.blocking,
                }
            }),
            metadata: self.remote_request_metadata(&params.metadata),
            tenant: params.tenant.clone(),
        }
    }
}

#[async_trait]
impl RequestHandler for ExternalAgentProxy {
    async fn on_message_send(
        &self,
        params: SendMessageParams,
    ) -> A2AResult<crate::types::SendMessageResponse> {
        self.client.send_message(self.to_wire_params(&params)).await
    }

    async fn on_message_send_stream(
        &self,
        params: SendMessageParams,
    ) -> A2AResult<broadcast::Receiver<StreamResponse>> {
        // The remote transport yields an SSE stream, not a broadcast
        // channel; bridge the two so callers see the same interface as a
        // locally executed agent.
        let mut sse = self.client.send_message_stream(self.to_wire_params(&params)).await?;
        let (tx, rx) = broadcast::channel(256);
        tokio::spawn(async move {
            use futures::StreamExt;
            while let Some(event) = sse.next().await {
                match event {
                    Ok(stream_event) => {
                        if tx.send(stream_event).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Ok(rx)
    }

    async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task> {
        self.client
            .get_task(crate::types::GetTaskParams {
                id: params.id,
                history_length: params.history_length.map(|h| h as i32),
                metadata: self.remote_request_metadata(&params.metadata),
                tenant: params.tenant,
            })
            .await
    }

    async fn on_list_tasks(&self, params: TaskListParams) -> A2AResult<TaskListResponse> {
        let _ = params;
        Err(A2AError::unsupported_operation(
            "listing tasks is not supported through an external agent proxy",
        ))
    }

    async fn on_cancel_task(&self, params: CancelTaskParams) -> A2AResult<Task> {
        self.client
            .cancel_task(crate::types::CancelTaskParams {
                id: params.id,
                metadata: self.remote_request_metadata(&params.metadata),
                tenant: params.tenant,
            })
            .await
    }

    async fn on_subscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
    ) -> A2AResult<broadcast::Receiver<StreamResponse>> {
        // Task subscription is explicitly allowed to be unimplemented for
        // proxies.
        let _ = params;
        Err(A2AError::unsupported_operation(
            "tasks/subscribe is not implemented for external agent proxies",
        ))
    }

    async fn on_set_task_push_notification_config(
        &self,
        _params: serde_json::Value,
    ) -> A2AResult<serde_json::Value> {
        Err(A2AError::push_notification_not_supported(
            "push notifications are not supported through an external agent proxy",
        ))
    }

    async fn on_get_task_push_notification_config(
        &self,
        _params: serde_json::Value,
    ) -> A2AResult<serde_json::Value> {
        Err(A2AError::push_notification_not_supported(
            "push notifications are not supported through an external agent proxy",
        ))
    }
}
