//! Stubs shared by the gateway integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use ca_domain::cancel::CancelToken;
use ca_domain::config::Config;
use ca_domain::error::{Error, Result};
use ca_domain::ids::{MessageId, SessionId, TaskId, UserId};
use ca_domain::model::{Message, Session, SkillRecord, Task, User};
use ca_domain::stream::{BoxStream, StreamEvent, Usage};
use ca_domain::tool::ChatMessage;
use ca_domain::value::{Channel, Role, TaskStatus};
use ca_gateway::runtime::schedules::ScheduleStore;
use ca_gateway::state::AppState;
use ca_providers::{ChatRequest, ChatResponse, LlmProvider};
use ca_sessions::{
    ConversationStore, MessageRepository, Repositories, SessionRepository, TaskRepository,
    UserRepository,
};
use ca_skills::{ExecutionResult, SkillRuntime, SkillsRegistry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum Reply {
    Text(String),
    Fail(String),
}

/// Answers every call with a fixed reply and records the requests.
pub struct StubProvider {
    reply: Reply,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl StubProvider {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Text(text.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Fail(message.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, req: &ChatRequest, _cancel: &CancelToken) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        match &self.reply {
            Reply::Text(text) => Ok(ChatResponse {
                message: ChatMessage::assistant(text.clone()),
                tool_calls: Vec::new(),
                usage: Usage::new(10, 5),
                model: req.model.clone().unwrap_or_else(|| "stub-model".into()),
                finish_reason: Some("stop".into()),
            }),
            Reply::Fail(message) => Err(Error::provider("stub", message.clone())),
        }
    }

    async fn chat_stream(
        &self,
        _req: &ChatRequest,
        _cancel: &CancelToken,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Err(Error::provider("stub", "streaming not supported"))
    }

    fn provider_id(&self) -> &str {
        "stub"
    }

    fn default_model(&self) -> &str {
        "stub-model"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Skill runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum RuntimeBehavior {
    Result(ExecutionResult),
    TransportError(String),
}

pub struct StubRuntime {
    behavior: RuntimeBehavior,
    pub calls: AtomicUsize,
}

impl StubRuntime {
    pub fn returning(result: ExecutionResult) -> Arc<Self> {
        Arc::new(Self {
            behavior: RuntimeBehavior::Result(result),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn broken(message: &str) -> Arc<Self> {
        Arc::new(Self {
            behavior: RuntimeBehavior::TransportError(message.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SkillRuntime for StubRuntime {
    async fn execute(
        &self,
        _name: &str,
        _input: &Map<String, Value>,
        _cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            RuntimeBehavior::Result(r) => Ok(r.clone()),
            RuntimeBehavior::TransportError(m) => Err(Error::SkillRuntime(m.clone())),
        }
    }

    async fn validate(&self, name: &str) -> Result<()> {
        match name {
            "echo" => Ok(()),
            other => Err(Error::not_found("skill", other)),
        }
    }

    async fn list(&self) -> Result<Vec<SkillRecord>> {
        Ok(vec![SkillRecord::new("echo", "1.0.0", "builtin:echo")?])
    }

    async fn get_skill(&self, name: &str) -> Result<SkillRecord> {
        match name {
            "echo" => SkillRecord::new("echo", "1.0.0", "builtin:echo"),
            other => Err(Error::not_found("skill", other)),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Repository wrappers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counts inserts so idempotence can be asserted.
pub struct CountingUsers {
    inner: Arc<ConversationStore>,
    pub creates: AtomicUsize,
}

impl CountingUsers {
    pub fn new(inner: Arc<ConversationStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            creates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl UserRepository for CountingUsers {
    async fn create(&self, user: User) -> Result<User> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        UserRepository::create(self.inner.as_ref(), user).await
    }
    async fn find_by_id(&self, id: &UserId) -> Result<User> {
        UserRepository::find_by_id(self.inner.as_ref(), id).await
    }
    async fn find_by_channel(&self, channel: &Channel, channel_id: &str) -> Result<User> {
        self.inner.find_by_channel(channel, channel_id).await
    }
    async fn list(&self) -> Result<Vec<User>> {
        UserRepository::list(self.inner.as_ref()).await
    }
    async fn delete(&self, id: &UserId) -> Result<()> {
        UserRepository::delete(self.inner.as_ref(), id).await
    }
}

/// Rejects every assistant message; user messages pass through.
pub struct AssistantWriteFails {
    inner: Arc<ConversationStore>,
}

impl AssistantWriteFails {
    pub fn new(inner: Arc<ConversationStore>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl MessageRepository for AssistantWriteFails {
    async fn append(&self, message: Message) -> Result<Message> {
        if message.role() == Role::Assistant {
            return Err(Error::Repository("disk full".into()));
        }
        self.inner.append(message).await
    }
    async fn find_by_id(&self, id: &MessageId) -> Result<Message> {
        MessageRepository::find_by_id(self.inner.as_ref(), id).await
    }
    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        MessageRepository::list_by_session(self.inner.as_ref(), session_id).await
    }
    async fn delete(&self, id: &MessageId) -> Result<()> {
        MessageRepository::delete(self.inner.as_ref(), id).await
    }
}

/// Every session timestamp update fails.
pub struct TouchFails {
    inner: Arc<ConversationStore>,
}

impl TouchFails {
    pub fn new(inner: Arc<ConversationStore>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl SessionRepository for TouchFails {
    async fn create(&self, session: Session) -> Result<Session> {
        SessionRepository::create(self.inner.as_ref(), session).await
    }
    async fn find_by_id(&self, id: &SessionId) -> Result<Session> {
        SessionRepository::find_by_id(self.inner.as_ref(), id).await
    }
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Session>> {
        self.inner.list_by_user(user_id).await
    }
    async fn touch(&self, _id: &SessionId, _at: DateTime<Utc>) -> Result<Session> {
        Err(Error::Repository("read-only replica".into()))
    }
    async fn delete(&self, id: &SessionId) -> Result<()> {
        SessionRepository::delete(self.inner.as_ref(), id).await
    }
}

/// Records every status handed to `update`. With `fail_updates` set the
/// status is still recorded but the write is rejected.
pub struct RecordingTasks {
    inner: Arc<ConversationStore>,
    fail_updates: bool,
    pub updates: Mutex<Vec<TaskStatus>>,
}

impl RecordingTasks {
    pub fn new(inner: Arc<ConversationStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_updates: false,
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_updates(inner: Arc<ConversationStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_updates: true,
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl TaskRepository for RecordingTasks {
    async fn create(&self, task: Task) -> Result<Task> {
        TaskRepository::create(self.inner.as_ref(), task).await
    }
    async fn update(&self, task: &Task) -> Result<()> {
        self.updates.lock().push(task.status());
        if self.fail_updates {
            return Err(Error::Repository("lock timeout".into()));
        }
        TaskRepository::update(self.inner.as_ref(), task).await
    }
    async fn find_by_id(&self, id: &TaskId) -> Result<Task> {
        TaskRepository::find_by_id(self.inner.as_ref(), id).await
    }
    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>> {
        TaskRepository::list_by_session(self.inner.as_ref(), session_id).await
    }
    async fn delete(&self, id: &TaskId) -> Result<()> {
        TaskRepository::delete(self.inner.as_ref(), id).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// App state over an in-memory store with the given collaborators.
pub fn state_with(
    store: Arc<ConversationStore>,
    repos: Repositories,
    provider: Arc<dyn LlmProvider>,
    runtime: Arc<dyn SkillRuntime>,
) -> AppState {
    AppState::new(
        Arc::new(Config::default()),
        store,
        repos,
        provider,
        Arc::new(SkillsRegistry::empty()),
        runtime,
        Arc::new(ScheduleStore::in_memory()),
    )
}

/// Plain in-memory state.
pub fn simple_state(provider: Arc<dyn LlmProvider>, runtime: Arc<dyn SkillRuntime>) -> AppState {
    let store = Arc::new(ConversationStore::in_memory());
    let repos = Repositories::from_store(store.clone());
    state_with(store, repos, provider, runtime)
}

pub fn echo_runtime() -> Arc<StubRuntime> {
    StubRuntime::returning(ExecutionResult::ok(r#"{"x":1}"#))
}
