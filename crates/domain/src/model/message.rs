use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{MessageId, SessionId};
use crate::value::Role;

/// One utterance in a session. Immutable once built; the only adjustment
/// allowed is the store re-stamping `created_at` before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    session_id: SessionId,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::validation("message content must not be empty"));
        }
        Ok(Self {
            id: MessageId::generate(),
            session_id,
            role,
            content,
            created_at: crate::time::now(),
        })
    }

    /// Replace the timestamp, consuming the unpersisted message.
    pub fn stamped(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Transcript order: `created_at`, ties broken by id.
    pub fn transcript_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::new("s1").unwrap()
    }

    #[test]
    fn rejects_blank_content() {
        assert!(Message::new(sid(), Role::User, "").is_err());
        assert!(Message::new(sid(), Role::User, " \n").is_err());
        assert!(Message::new(sid(), Role::User, "Hello").is_ok());
    }

    #[test]
    fn ties_break_on_id() {
        let at = crate::time::now();
        let a = Message::new(sid(), Role::User, "a").unwrap().stamped(at);
        let b = Message::new(sid(), Role::Assistant, "b").unwrap().stamped(at);
        let expected = a.id().cmp(b.id());
        assert_eq!(a.transcript_cmp(&b), expected);
        assert_eq!(b.transcript_cmp(&a), expected.reverse());
    }
}
