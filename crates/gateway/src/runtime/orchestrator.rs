//! The conversation pipeline: resolve the user, open a session, persist the
//! prompt, call the provider, persist the reply, and read the transcript
//! back.
//!
//! Steps run strictly in order. The cancellation token is checked at every
//! step boundary; once it fires no further I/O is started.

use std::sync::Arc;

use ca_domain::cancel::CancelToken;
use ca_domain::error::{Error, Result};
use ca_domain::ids::{SessionId, UserId};
use ca_domain::model::{Message, Session, Task, User};
use ca_domain::stream::Usage;
use ca_domain::tool::ChatMessage;
use ca_domain::trace::TraceEvent;
use ca_domain::value::{Channel, Role};
use ca_providers::{ChatRequest, LlmProvider};
use ca_sessions::Repositories;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One inbound chat turn.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Channel-local user identifier.
    pub user_id: String,
    /// `None` uses the configured default channel.
    pub channel: Option<String>,
    /// `None` means `user`; any other role is rejected.
    pub role: Option<String>,
    pub content: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub user: User,
    pub session: Session,
    /// The assistant reply. Present even when persisting it failed.
    pub message: Message,
    /// The session transcript as stored after the turn.
    pub messages: Vec<Message>,
    pub usage: Usage,
    pub model: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    repos: Repositories,
    provider: Arc<dyn LlmProvider>,
    default_channel: Channel,
    system_prompt: Option<String>,
}

impl Orchestrator {
    pub fn new(repos: Repositories, provider: Arc<dyn LlmProvider>, default_channel: Channel) -> Self {
        Self {
            repos,
            provider,
            default_channel,
            system_prompt: None,
        }
    }

    /// Prepend `prompt` as a system message to every provider call.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run one chat turn end to end.
    pub async fn send(&self, req: SendRequest, cancel: &CancelToken) -> Result<SendOutcome> {
        let (channel, channel_id) = self.validate(&req)?;

        cancel.checkpoint("ensure_user")?;
        let user = self.ensure_user(&channel, &channel_id).await?;

        cancel.checkpoint("open_session")?;
        let session = self
            .repos
            .sessions
            .create(Session::new(user.id.clone()))
            .await
            .map_err(repository_error)?;
        TraceEvent::SessionOpened {
            session_id: session.id.to_string(),
            user_id: user.id.to_string(),
        }
        .emit();

        cancel.checkpoint("append_user_message")?;
        let prompt = Message::new(session.id.clone(), Role::User, req.content)?;
        let prompt = self
            .repos
            .messages
            .append(prompt)
            .await
            .map_err(repository_error)?;
        trace_append(&prompt);

        cancel.checkpoint("history")?;
        let history = self.history(&session.id).await?;

        let chat = ChatRequest {
            messages: history,
            max_tokens: req.max_tokens,
            model: req.model,
            ..Default::default()
        };
        let provider_id = self.provider.provider_id().to_owned();
        let response = cancel
            .run("llm", self.provider.chat(&chat, cancel))
            .await
            .map_err(|e| provider_error(&provider_id, e))?;

        cancel.checkpoint("persist_assistant_message")?;
        let reply = Message::new(session.id.clone(), Role::Assistant, response.message.content)
            .map_err(|_| Error::provider(&provider_id, "empty assistant reply"))?;
        let reply = match self.repos.messages.append(reply.clone()).await {
            Ok(stored) => {
                trace_append(&stored);
                stored
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "failed to persist assistant message, returning reply anyway"
                );
                reply
            }
        };

        let messages = match self.repos.messages.list_by_session(&session.id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "transcript re-read failed");
                vec![prompt, reply.clone()]
            }
        };

        let session = match self.repos.sessions.touch(&session.id, ca_domain::time::now()).await {
            Ok(touched) => touched,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "failed to update session timestamp");
                session
            }
        };

        Ok(SendOutcome {
            user,
            session,
            message: reply,
            messages,
            usage: response.usage,
            model: response.model,
        })
    }

    fn validate(&self, req: &SendRequest) -> Result<(Channel, String)> {
        let channel_id = req.user_id.trim();
        if channel_id.is_empty() {
            return Err(Error::validation("user_id must not be empty"));
        }
        if req.content.trim().is_empty() {
            return Err(Error::validation("message content must not be empty"));
        }
        if let Some(role) = &req.role {
            let role: Role = role.parse()?;
            if role != Role::User {
                return Err(Error::validation(format!(
                    "message role must be \"user\", got \"{role}\""
                )));
            }
        }
        if req.max_tokens == Some(0) {
            return Err(Error::validation("max_tokens must be greater than 0"));
        }
        let channel = match &req.channel {
            Some(raw) => Channel::parse(raw)?,
            None => self.default_channel.clone(),
        };
        Ok((channel, channel_id.to_owned()))
    }

    /// Find the user for `(channel, channel_id)` or create it. Never creates
    /// two users for the same pair: a lost insert race re-reads the winner.
    pub async fn ensure_user(&self, channel: &Channel, channel_id: &str) -> Result<User> {
        match self.repos.users.find_by_channel(channel, channel_id).await {
            Ok(user) => {
                trace_user(&user, false);
                return Ok(user);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(repository_error(e)),
        }

        let user = User::new(channel.clone(), channel_id)?;
        match self.repos.users.create(user).await {
            Ok(user) => {
                trace_user(&user, true);
                Ok(user)
            }
            Err(Error::Duplicate { .. }) => self
                .repos
                .users
                .find_by_channel(channel, channel_id)
                .await
                .map_err(repository_error),
            Err(e) => Err(repository_error(e)),
        }
    }

    /// The session transcript as provider messages, oldest first, with the
    /// configured system prompt in front.
    async fn history(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        let stored = self
            .repos
            .messages
            .list_by_session(session_id)
            .await
            .map_err(repository_error)?;
        let mut history = Vec::with_capacity(stored.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            history.push(ChatMessage::system(prompt.clone()));
        }
        history.extend(stored.iter().map(|m| ChatMessage {
            role: m.role(),
            content: m.content().to_owned(),
        }));
        Ok(history)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_conversation(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        self.repos.sessions.find_by_id(session_id).await?;
        self.repos.messages.list_by_session(session_id).await
    }

    pub async fn get_user_sessions(&self, user_id: &UserId) -> Result<Vec<Session>> {
        self.repos.users.find_by_id(user_id).await?;
        self.repos.sessions.list_by_user(user_id).await
    }

    pub async fn get_session_tasks(&self, session_id: &SessionId) -> Result<Vec<Task>> {
        self.repos.sessions.find_by_id(session_id).await?;
        self.repos.tasks.list_by_session(session_id).await
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        self.repos.sessions.find_by_id(session_id).await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.repos.users.find_by_id(user_id).await
    }

    /// Open an empty session for an existing user.
    pub async fn create_session(&self, user_id: &UserId) -> Result<Session> {
        self.repos.users.find_by_id(user_id).await?;
        let session = self.repos.sessions.create(Session::new(user_id.clone())).await?;
        TraceEvent::SessionOpened {
            session_id: session.id.to_string(),
            user_id: user_id.to_string(),
        }
        .emit();
        Ok(session)
    }

    /// Delete a session with its messages and tasks.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.repos.sessions.delete(session_id).await
    }
}

/// Anything a repository reports besides absence is a `Repository` error.
fn repository_error(e: Error) -> Error {
    match e {
        Error::Repository(_) | Error::Canceled(_) => e,
        other => Error::Repository(other.to_string()),
    }
}

fn provider_error(provider: &str, e: Error) -> Error {
    match e {
        Error::Provider { .. } | Error::Canceled(_) => e,
        other => Error::provider(provider, other.to_string()),
    }
}

fn trace_user(user: &User, created: bool) {
    TraceEvent::UserResolved {
        user_id: user.id.to_string(),
        channel: user.channel.to_string(),
        created,
    }
    .emit();
}

fn trace_append(message: &Message) {
    TraceEvent::MessageAppended {
        session_id: message.session_id().to_string(),
        message_id: message.id().to_string(),
        role: message.role().to_string(),
    }
    .emit();
}
