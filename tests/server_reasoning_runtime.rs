//! End-to-end coverage of `DefaultRequestHandler` driving a
//! `ReasoningAgentExecutor`: non-blocking dispatch, HITL pause/resume, and
//! checkpoint persistence, exercised through the public request-handler
//! surface rather than the executor directly.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use a2a_rs::config::{AgentConfig, HitlMode, ReasoningConfig, TaskConfig, Visibility};
use a2a_rs::error::A2AResult;
use a2a_rs::server::{
    CheckpointManager, CheckpointStrategy, DefaultRequestHandler, GetTaskParams,
    InMemorySessionStore, InMemoryTaskStore, PendingToolCall, PersistentSessionStore,
    ReasoningAgentExecutor, ReasoningChunk, ReasoningOutcome, ReasoningSnapshot,
    ReasoningStrategy, ReasoningStrategyFactory, RequestHandler, SendMessageConfiguration,
    SendMessageParams, SessionStore, TaskStore,
};
use a2a_rs::types::{Message, SendMessageResponse, TaskState};

/// A strategy whose outcomes are scripted in advance, mirroring the
/// executor's own unit-test double — here it drives a handler-level,
/// end-to-end scenario instead of calling the executor directly.
struct ScriptedStrategy {
    script: VecDeque<ReasoningOutcome>,
    step_delay: Option<Duration>,
}

#[async_trait]
impl ReasoningStrategy for ScriptedStrategy {
    async fn step(
        &mut self,
        snapshot: &mut ReasoningSnapshot,
        tx: &mpsc::Sender<ReasoningChunk>,
    ) -> A2AResult<ReasoningOutcome> {
        if let Some(delay) = self.step_delay {
            tokio::time::sleep(delay).await;
        }
        snapshot.iteration += 1;
        let outcome = self.script.pop_front().unwrap_or(ReasoningOutcome::Done);
        if let ReasoningOutcome::Done = &outcome {
            snapshot.accumulated_response.push_str("final answer");
            let _ = tx.send(ReasoningChunk("final answer".to_string())).await;
        }
        Ok(outcome)
    }
}

/// Builds one `ScriptedStrategy` per call, handing out the next script off a
/// fixed list — the first `execute()` against a context/task gets
/// `scripts[0]`, a resumed `execute()` against the same pair gets
/// `scripts[1]`, and so on.
struct SequencedFactory {
    call: std::sync::atomic::AtomicUsize,
    scripts: Vec<Vec<ReasoningOutcome>>,
    delay: Option<Duration>,
}

impl SequencedFactory {
    fn new(scripts: Vec<Vec<ReasoningOutcome>>) -> Self {
        Self { call: std::sync::atomic::AtomicUsize::new(0), scripts, delay: None }
    }

    fn slow(scripts: Vec<Vec<ReasoningOutcome>>, delay: Duration) -> Self {
        Self { call: std::sync::atomic::AtomicUsize::new(0), scripts, delay: Some(delay) }
    }
}

impl ReasoningStrategyFactory for SequencedFactory {
    fn build(&self, _engine_name: &str) -> A2AResult<Box<dyn ReasoningStrategy>> {
        let idx = self.call.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Box::new(ScriptedStrategy {
            script: self.scripts.get(idx).cloned().unwrap_or_default().into(),
            step_delay: self.delay,
        }))
    }
}

fn agent_config(engine: &str, max_iterations: u32, task: TaskConfig) -> AgentConfig {
    AgentConfig {
        id: "agent-1".to_string(),
        reasoning: ReasoningConfig { engine: engine.to_string(), max_iterations },
        task,
        session_store: None,
        visibility: Visibility::Public,
        proxy: None,
        security_schemes: None,
        security: None,
    }
}

fn send_params(text: &str, blocking: Option<bool>) -> SendMessageParams {
    SendMessageParams {
        message: Message::user("m1", text),
        configuration: Some(SendMessageConfiguration {
            accepted_output_modes: None,
            blocking,
            history_length: None,
            push_notification_config: None,
        }),
        metadata: None,
        tenant: None,
    }
}

fn send_params_with_task(text: &str, task_id: &str) -> SendMessageParams {
    let mut msg = Message::user("m1", text);
    msg.task_id = Some(task_id.to_string());
    SendMessageParams {
        message: msg,
        configuration: None,
        metadata: None,
        tenant: None,
    }
}

#[tokio::test]
async fn non_blocking_send_returns_before_completion_then_polls_to_done() {
    let config = agent_config("echo", 10, TaskConfig::default());
    let factory = Arc::new(SequencedFactory::slow(
        vec![vec![ReasoningOutcome::Done]],
        Duration::from_millis(150),
    ));
    let store = Arc::new(InMemorySessionStore::new());
    let executor = Arc::new(ReasoningAgentExecutor::new(config, factory, store));
    let task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let handler = DefaultRequestHandler::new(executor, task_store);

    let response = handler
        .on_message_send(send_params("hello", Some(false)))
        .await
        .unwrap();

    let task_id = match response {
        SendMessageResponse::Task(task) => {
            assert_ne!(task.status.state, TaskState::Completed, "non-blocking send must not wait for completion");
            task.id
        }
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    };

    // The agent keeps running in the background; poll until it lands.
    let mut completed = false;
    for _ in 0..20 {
        let task = handler
            .on_get_task(GetTaskParams { id: task_id.clone(), history_length: None, metadata: None, tenant: None })
            .await
            .unwrap();
        if task.status.state == TaskState::Completed {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed, "background execution never reached Completed");
}

#[tokio::test]
async fn blocking_send_waits_for_completion() {
    let config = agent_config("echo", 10, TaskConfig::default());
    let factory = Arc::new(SequencedFactory::new(vec![vec![ReasoningOutcome::Done]]));
    let store = Arc::new(InMemorySessionStore::new());
    let executor = Arc::new(ReasoningAgentExecutor::new(config, factory, store));
    let task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let handler = DefaultRequestHandler::new(executor, task_store);

    let response = handler.on_message_send(send_params("hello", None)).await.unwrap();
    match response {
        SendMessageResponse::Task(task) => assert_eq!(task.status.state, TaskState::Completed),
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    }
}

#[tokio::test]
async fn hitl_pause_through_handler_checkpoints_then_resumes_on_followup_send() {
    let mut task_config = TaskConfig::default();
    task_config.enable_checkpointing = true;
    task_config.checkpoint_strategy = CheckpointStrategy::Event;
    task_config.auto_resume_hitl = true;
    task_config.hitl_mode = HitlMode::Async;
    let config = agent_config("echo", 10, task_config);

    let pending = PendingToolCall {
        tool_name: "get_weather".to_string(),
        arguments: HashMap::from([(
            "location".to_string(),
            serde_json::Value::String("SF".to_string()),
        )]),
    };
    let factory = Arc::new(SequencedFactory::new(vec![
        vec![ReasoningOutcome::Pause(pending)],
        vec![ReasoningOutcome::Done],
    ]));
    let store: Arc<dyn SessionStore> =
        Arc::new(PersistentSessionStore::new(Arc::new(InMemorySessionStore::new())));
    let checkpoints = CheckpointManager::new(Arc::clone(&store), 0);
    let executor = Arc::new(ReasoningAgentExecutor::new(config, factory, Arc::clone(&store)));
    let task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let handler = DefaultRequestHandler::new(executor, task_store);

    let response = handler
        .on_message_send(send_params("what's the weather?", None))
        .await
        .unwrap();
    let (task_id, context_id) = match response {
        SendMessageResponse::Task(task) => {
            assert_eq!(task.status.state, TaskState::InputRequired);
            (task.id, task.context_id)
        }
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    };

    let checkpoint = checkpoints.load(&context_id, &task_id).await.unwrap();
    assert!(checkpoint.requires_input());

    let response2 = handler
        .on_message_send(send_params_with_task("SF it is", &task_id))
        .await
        .unwrap();
    match response2 {
        SendMessageResponse::Task(task) => assert_eq!(task.status.state, TaskState::Completed),
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    }
}

#[tokio::test]
async fn hitl_pause_checkpoints_through_handler_even_with_blocking_mode_configured() {
    // `hitl_mode = Blocking` only affects the downgrade warning when no
    // persistent store is attached — with one attached, the checkpoint must
    // still persist so a follow-up send on the same task can resume.
    let mut task_config = TaskConfig::default();
    task_config.enable_checkpointing = true;
    task_config.checkpoint_strategy = CheckpointStrategy::Event;
    task_config.auto_resume_hitl = true;
    task_config.hitl_mode = HitlMode::Blocking;
    let config = agent_config("echo", 10, task_config);

    let pending = PendingToolCall {
        tool_name: "get_weather".to_string(),
        arguments: HashMap::from([(
            "location".to_string(),
            serde_json::Value::String("SF".to_string()),
        )]),
    };
    let factory = Arc::new(SequencedFactory::new(vec![
        vec![ReasoningOutcome::Pause(pending)],
        vec![ReasoningOutcome::Done],
    ]));
    let store: Arc<dyn SessionStore> =
        Arc::new(PersistentSessionStore::new(Arc::new(InMemorySessionStore::new())));
    let checkpoints = CheckpointManager::new(Arc::clone(&store), 0);
    let executor = Arc::new(ReasoningAgentExecutor::new(config, factory, Arc::clone(&store)));
    let task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let handler = DefaultRequestHandler::new(executor, task_store);

    let response = handler
        .on_message_send(send_params("what's the weather?", None))
        .await
        .unwrap();
    let (task_id, context_id) = match response {
        SendMessageResponse::Task(task) => {
            assert_eq!(task.status.state, TaskState::InputRequired);
            (task.id, task.context_id)
        }
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    };

    let checkpoint = checkpoints.load(&context_id, &task_id).await.unwrap();
    assert!(checkpoint.requires_input());

    let response2 = handler
        .on_message_send(send_params_with_task("SF it is", &task_id))
        .await
        .unwrap();
    match response2 {
        SendMessageResponse::Task(task) => assert_eq!(task.status.state, TaskState::Completed),
        SendMessageResponse::Message(_) => panic!("expected a Task response"),
    }
}
