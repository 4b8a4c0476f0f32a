use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ca_domain::error::Result;
use ca_domain::ids::{MessageId, SessionId, TaskId, UserId};
use ca_domain::model::{Message, Session, Task, User};
use ca_domain::value::Channel;

/// Lookups return `Error::NotFound` on absence; inserts that violate a
/// uniqueness constraint return `Error::Duplicate`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User>;
    async fn find_by_id(&self, id: &UserId) -> Result<User>;
    async fn find_by_channel(&self, channel: &Channel, channel_id: &str) -> Result<User>;
    async fn list(&self) -> Result<Vec<User>>;
    /// Sessions owned by the user are kept.
    async fn delete(&self, id: &UserId) -> Result<()>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fails with `NotFound` when the owning user does not exist.
    async fn create(&self, session: Session) -> Result<Session>;
    async fn find_by_id(&self, id: &SessionId) -> Result<Session>;
    /// Sessions of a user, oldest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Session>>;
    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<Session>;
    /// Deletes the session together with its messages and tasks.
    async fn delete(&self, id: &SessionId) -> Result<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Appends to the session transcript. The stored `created_at` is never
    /// earlier than the session's latest message, so append order and
    /// transcript order agree.
    async fn append(&self, message: Message) -> Result<Message>;
    async fn find_by_id(&self, id: &MessageId) -> Result<Message>;
    /// Transcript order: `created_at`, then id.
    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Message>>;
    async fn delete(&self, id: &MessageId) -> Result<()>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: Task) -> Result<Task>;
    /// Replaces the stored task with the same id.
    async fn update(&self, task: &Task) -> Result<()>;
    async fn find_by_id(&self, id: &TaskId) -> Result<Task>;
    /// Tasks of a session in creation order.
    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>>;
    async fn delete(&self, id: &TaskId) -> Result<()>;
}

/// The repository handles the orchestrator is built from.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Repositories {
    /// All four repositories backed by one store.
    pub fn from_store(store: Arc<crate::ConversationStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            messages: store.clone(),
            tasks: store,
        }
    }
}
