//! In-process conversation store.
//!
//! All tables live behind one lock so multi-table writes (the session
//! delete cascade) are atomic. With a state path the store snapshots to
//! `conversations.json` on `flush`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ca_domain::error::{Error, Result};
use ca_domain::ids::{MessageId, SessionId, TaskId, UserId};
use ca_domain::model::{Message, Session, Task, User};
use ca_domain::trace::TraceEvent;
use ca_domain::value::Channel;

use crate::repository::{MessageRepository, SessionRepository, TaskRepository, UserRepository};

const SNAPSHOT_FILE: &str = "conversations.json";
const SNAPSHOT_VERSION: u32 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// `(channel, channel_id)` unique index.
    users_by_channel: HashMap<(Channel, String), UserId>,
    sessions: HashMap<SessionId, Session>,
    /// Per-session transcript, kept sorted.
    messages: HashMap<SessionId, Vec<Message>>,
    message_index: HashMap<MessageId, SessionId>,
    /// Per-session tasks in creation order.
    tasks: HashMap<SessionId, Vec<Task>>,
    task_index: HashMap<TaskId, SessionId>,
}

/// On-disk shape: flat lists, rebuilt into indexed tables on load.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    users: Vec<User>,
    sessions: Vec<Session>,
    messages: Vec<Message>,
    tasks: Vec<Task>,
}

impl Tables {
    fn from_snapshot(snap: Snapshot) -> Result<Self> {
        let mut t = Tables::default();
        for user in snap.users {
            t.insert_user(user)?;
        }
        for session in snap.sessions {
            t.sessions.insert(session.id.clone(), session);
        }
        for message in snap.messages {
            if !t.sessions.contains_key(message.session_id()) {
                tracing::warn!(message_id = %message.id(), "dropping orphan message from snapshot");
                continue;
            }
            t.message_index
                .insert(message.id().clone(), message.session_id().clone());
            t.messages
                .entry(message.session_id().clone())
                .or_default()
                .push(message);
        }
        for transcript in t.messages.values_mut() {
            transcript.sort_by(|a, b| a.transcript_cmp(b));
        }
        // Snapshot order is creation order.
        for task in snap.tasks {
            if !t.sessions.contains_key(task.session_id()) {
                tracing::warn!(task_id = %task.id(), "dropping orphan task from snapshot");
                continue;
            }
            t.task_index.insert(task.id().clone(), task.session_id().clone());
            t.tasks.entry(task.session_id().clone()).or_default().push(task);
        }
        Ok(t)
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let messages = sessions
            .iter()
            .flat_map(|s| self.messages.get(&s.id).into_iter().flatten().cloned())
            .collect();
        let tasks = sessions
            .iter()
            .flat_map(|s| self.tasks.get(&s.id).into_iter().flatten().cloned())
            .collect();
        Snapshot {
            version: SNAPSHOT_VERSION,
            users,
            sessions,
            messages,
            tasks,
        }
    }

    fn insert_user(&mut self, user: User) -> Result<()> {
        let key = (user.channel.clone(), user.channel_id.clone());
        if self.users_by_channel.contains_key(&key) {
            return Err(Error::Duplicate {
                entity: "user",
                key: user.identity_key(),
            });
        }
        if self.users.contains_key(&user.id) {
            return Err(Error::Duplicate {
                entity: "user",
                key: user.id.to_string(),
            });
        }
        self.users_by_channel.insert(key, user.id.clone());
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn require_session(&self, id: &SessionId) -> Result<&Session> {
        self.sessions
            .get(id)
            .ok_or_else(|| Error::not_found("session", id.as_str()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Row counts, for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub sessions: usize,
    pub messages: usize,
    pub tasks: usize,
}

pub struct ConversationStore {
    snapshot_path: Option<PathBuf>,
    tables: RwLock<Tables>,
    dirty: AtomicBool,
}

impl ConversationStore {
    /// Volatile store; `flush` is a no-op.
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            tables: RwLock::new(Tables::default()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load or create the store at `state_path/conversations.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path)?;
        let snapshot_path = state_path.join(SNAPSHOT_FILE);

        let tables = if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path)?;
            let snap: Snapshot = serde_json::from_str(&raw).map_err(|e| {
                Error::Repository(format!("corrupt snapshot {}: {e}", snapshot_path.display()))
            })?;
            if snap.version != SNAPSHOT_VERSION {
                return Err(Error::Repository(format!(
                    "unsupported snapshot version {} in {}",
                    snap.version,
                    snapshot_path.display()
                )));
            }
            Tables::from_snapshot(snap)?
        } else {
            Tables::default()
        };

        tracing::info!(
            users = tables.users.len(),
            sessions = tables.sessions.len(),
            path = %snapshot_path.display(),
            "conversation store loaded"
        );

        Ok(Self {
            snapshot_path: Some(snapshot_path),
            tables: RwLock::new(tables),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn stats(&self) -> StoreStats {
        let t = self.tables.read();
        StoreStats {
            users: t.users.len(),
            sessions: t.sessions.len(),
            messages: t.message_index.len(),
            tasks: t.task_index.len(),
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Persist the current state to disk (temp file + rename). Skipped when
    /// nothing changed since the last flush.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let started = Instant::now();
        let json = {
            let tables = self.tables.read();
            serde_json::to_string_pretty(&tables.to_snapshot())
        };
        let json = match json {
            Ok(json) => json,
            Err(e) => {
                self.mark_dirty();
                return Err(Error::Other(format!("serializing conversations: {e}")));
            }
        };
        let tmp = path.with_extension("json.tmp");
        let written = std::fs::write(&tmp, &json).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = written {
            self.mark_dirty();
            return Err(Error::Io(e));
        }
        TraceEvent::StoreFlushed {
            path: path.display().to_string(),
            bytes: json.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Repository impls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl UserRepository for ConversationStore {
    async fn create(&self, user: User) -> Result<User> {
        self.tables.write().insert_user(user.clone())?;
        self.mark_dirty();
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<User> {
        self.tables
            .read()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("user", id.as_str()))
    }

    async fn find_by_channel(&self, channel: &Channel, channel_id: &str) -> Result<User> {
        let t = self.tables.read();
        t.users_by_channel
            .get(&(channel.clone(), channel_id.to_owned()))
            .and_then(|id| t.users.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found("user", format!("{channel}:{channel_id}")))
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        let mut t = self.tables.write();
        let user = t
            .users
            .remove(id)
            .ok_or_else(|| Error::not_found("user", id.as_str()))?;
        t.users_by_channel.remove(&(user.channel, user.channel_id));
        drop(t);
        self.mark_dirty();
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for ConversationStore {
    async fn create(&self, session: Session) -> Result<Session> {
        let mut t = self.tables.write();
        if !t.users.contains_key(&session.user_id) {
            return Err(Error::not_found("user", session.user_id.as_str()));
        }
        if t.sessions.contains_key(&session.id) {
            return Err(Error::Duplicate {
                entity: "session",
                key: session.id.to_string(),
            });
        }
        t.sessions.insert(session.id.clone(), session.clone());
        drop(t);
        self.mark_dirty();
        Ok(session)
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Session> {
        self.tables.read().require_session(id).cloned()
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .tables
            .read()
            .sessions
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<Session> {
        let mut t = self.tables.write();
        let session = t
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::not_found("session", id.as_str()))?;
        session.touch(at);
        let session = session.clone();
        drop(t);
        self.mark_dirty();
        Ok(session)
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let mut t = self.tables.write();
        if t.sessions.remove(id).is_none() {
            return Err(Error::not_found("session", id.as_str()));
        }
        for message in t.messages.remove(id).unwrap_or_default() {
            t.message_index.remove(message.id());
        }
        for task in t.tasks.remove(id).unwrap_or_default() {
            t.task_index.remove(task.id());
        }
        drop(t);
        self.mark_dirty();
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for ConversationStore {
    async fn append(&self, message: Message) -> Result<Message> {
        let mut t = self.tables.write();
        t.require_session(message.session_id())?;
        if t.message_index.contains_key(message.id()) {
            return Err(Error::Duplicate {
                entity: "message",
                key: message.id().to_string(),
            });
        }
        let session_id = message.session_id().clone();
        let transcript = t.messages.entry(session_id.clone()).or_default();
        let message = match transcript.last() {
            Some(last) if last.created_at() > message.created_at() => {
                let at = last.created_at();
                message.stamped(at)
            }
            _ => message,
        };
        let pos = transcript.partition_point(|m| m.transcript_cmp(&message).is_lt());
        transcript.insert(pos, message.clone());
        t.message_index.insert(message.id().clone(), session_id);
        drop(t);
        self.mark_dirty();
        Ok(message)
    }

    async fn find_by_id(&self, id: &MessageId) -> Result<Message> {
        let t = self.tables.read();
        t.message_index
            .get(id)
            .and_then(|sid| t.messages.get(sid))
            .and_then(|list| list.iter().find(|m| m.id() == id))
            .cloned()
            .ok_or_else(|| Error::not_found("message", id.as_str()))
    }

    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        Ok(self
            .tables
            .read()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, id: &MessageId) -> Result<()> {
        let mut t = self.tables.write();
        let session_id = t
            .message_index
            .remove(id)
            .ok_or_else(|| Error::not_found("message", id.as_str()))?;
        if let Some(list) = t.messages.get_mut(&session_id) {
            list.retain(|m| m.id() != id);
        }
        drop(t);
        self.mark_dirty();
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for ConversationStore {
    async fn create(&self, task: Task) -> Result<Task> {
        let mut t = self.tables.write();
        t.require_session(task.session_id())?;
        if t.task_index.contains_key(task.id()) {
            return Err(Error::Duplicate {
                entity: "task",
                key: task.id().to_string(),
            });
        }
        t.task_index
            .insert(task.id().clone(), task.session_id().clone());
        t.tasks
            .entry(task.session_id().clone())
            .or_default()
            .push(task.clone());
        drop(t);
        self.mark_dirty();
        Ok(task)
    }

    async fn update(&self, task: &Task) -> Result<()> {
        let mut t = self.tables.write();
        let stored = t
            .tasks
            .get_mut(task.session_id())
            .and_then(|list| list.iter_mut().find(|x| x.id() == task.id()))
            .ok_or_else(|| Error::not_found("task", task.id().as_str()))?;
        *stored = task.clone();
        drop(t);
        self.mark_dirty();
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Task> {
        let t = self.tables.read();
        t.task_index
            .get(id)
            .and_then(|sid| t.tasks.get(sid))
            .and_then(|list| list.iter().find(|x| x.id() == id))
            .cloned()
            .ok_or_else(|| Error::not_found("task", id.as_str()))
    }

    async fn list_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>> {
        Ok(self
            .tables
            .read()
            .tasks
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        let mut t = self.tables.write();
        let session_id = t
            .task_index
            .remove(id)
            .ok_or_else(|| Error::not_found("task", id.as_str()))?;
        if let Some(list) = t.tasks.get_mut(&session_id) {
            list.retain(|x| x.id() != id);
        }
        drop(t);
        self.mark_dirty();
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ca_domain::value::{Role, TaskStatus};

    async fn seed(store: &ConversationStore) -> (User, Session) {
        let user = UserRepository::create(store, User::new(Channel::Web, "u1").unwrap())
            .await
            .unwrap();
        let session = SessionRepository::create(store, Session::new(user.id.clone()))
            .await
            .unwrap();
        (user, session)
    }

    #[tokio::test]
    async fn channel_pair_is_unique() {
        let store = ConversationStore::in_memory();
        seed(&store).await;
        let err = UserRepository::create(&store, User::new(Channel::Web, "u1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate { entity: "user", .. }));

        // Same channel_id on a different channel is a different user.
        UserRepository::create(&store, User::new(Channel::Telegram, "u1").unwrap())
            .await
            .unwrap();
        assert_eq!(store.stats().users, 2);
    }

    #[tokio::test]
    async fn session_requires_user() {
        let store = ConversationStore::in_memory();
        let orphan = Session::new(UserId::new("ghost").unwrap());
        let err = SessionRepository::create(&store, orphan).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn append_keeps_transcript_monotonic() {
        let store = ConversationStore::in_memory();
        let (_, session) = seed(&store).await;

        let first = Message::new(session.id.clone(), Role::User, "Hello").unwrap();
        let first = store.append(first).await.unwrap();

        // A message stamped in the past lands after the existing one.
        let stale = Message::new(session.id.clone(), Role::Assistant, "Hi")
            .unwrap()
            .stamped(first.created_at() - chrono::Duration::seconds(30));
        let second = store.append(stale).await.unwrap();
        assert_eq!(second.created_at(), first.created_at());

        let transcript = MessageRepository::list_by_session(&store, &session.id)
            .await
            .unwrap();
        let contents: Vec<&str> = transcript.iter().map(|m| m.content()).collect();
        assert_eq!(contents, ["Hello", "Hi"]);
    }

    #[tokio::test]
    async fn append_to_missing_session_fails() {
        let store = ConversationStore::in_memory();
        let msg = Message::new(SessionId::new("nope").unwrap(), Role::User, "x").unwrap();
        assert!(store.append(msg).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_session_cascades() {
        let store = ConversationStore::in_memory();
        let (user, session) = seed(&store).await;
        let msg = Message::new(session.id.clone(), Role::User, "Hello").unwrap();
        let msg = store.append(msg).await.unwrap();
        let task = Task::new(session.id.clone(), "echo", "{}").unwrap();
        let task = TaskRepository::create(&store, task).await.unwrap();

        SessionRepository::delete(&store, &session.id).await.unwrap();

        assert!(MessageRepository::find_by_id(&store, msg.id())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(TaskRepository::find_by_id(&store, task.id())
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            store.stats(),
            StoreStats {
                users: 1,
                sessions: 0,
                messages: 0,
                tasks: 0
            }
        );
        // The user survives.
        UserRepository::find_by_id(&store, &user.id).await.unwrap();
    }

    #[tokio::test]
    async fn user_delete_keeps_sessions() {
        let store = ConversationStore::in_memory();
        let (user, session) = seed(&store).await;
        UserRepository::delete(&store, &user.id).await.unwrap();
        SessionRepository::find_by_id(&store, &session.id).await.unwrap();
        // The channel pair is free again.
        UserRepository::create(&store, User::new(Channel::Web, "u1").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tasks_keep_creation_order_and_updates() {
        let store = ConversationStore::in_memory();
        let (_, session) = seed(&store).await;
        let a = TaskRepository::create(&store, Task::new(session.id.clone(), "b", "{}").unwrap())
            .await
            .unwrap();
        let mut b = TaskRepository::create(&store, Task::new(session.id.clone(), "a", "{}").unwrap())
            .await
            .unwrap();
        b.start().unwrap();
        store.update(&b).await.unwrap();

        let tasks = TaskRepository::list_by_session(&store, &session.id)
            .await
            .unwrap();
        assert_eq!(tasks[0].id(), a.id());
        assert_eq!(tasks[1].id(), b.id());
        assert_eq!(tasks[1].status(), TaskStatus::Running);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let session_id = {
            let store = ConversationStore::open(dir.path()).unwrap();
            let (_, session) = seed(&store).await;
            for text in ["one", "two", "three"] {
                let m = Message::new(session.id.clone(), Role::User, text).unwrap();
                store.append(m).await.unwrap();
            }
            let mut task = Task::new(session.id.clone(), "echo", "{}").unwrap();
            task.start().unwrap();
            task.complete("{}").unwrap();
            TaskRepository::create(&store, task).await.unwrap();
            store.flush().unwrap();
            session.id
        };

        let store = ConversationStore::open(dir.path()).unwrap();
        let transcript = MessageRepository::list_by_session(&store, &session_id)
            .await
            .unwrap();
        let contents: Vec<&str> = transcript.iter().map(|m| m.content()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        let tasks = TaskRepository::list_by_session(&store, &session_id)
            .await
            .unwrap();
        assert_eq!(tasks[0].status(), TaskStatus::Completed);
        let user = store.find_by_channel(&Channel::Web, "u1").await.unwrap();
        assert_eq!(user.channel_id, "u1");
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "{not json").unwrap();
        let err = ConversationStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, Error::Repository(_)));
    }

    #[test]
    fn in_memory_flush_is_noop() {
        ConversationStore::in_memory().flush().unwrap();
    }
}
