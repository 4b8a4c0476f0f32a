//! Wire shapes. Every field is a string (or string list) so the JSON
//! mirrors what is stored; timestamps are RFC 3339 UTC.

use serde::Serialize;

use ca_domain::model::{Message, Schedule, Session, SkillRecord, Task, User};
use ca_domain::time::format_rfc3339;

#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id().to_string(),
            session_id: m.session_id().to_string(),
            role: m.role().to_string(),
            content: m.content().to_owned(),
            created_at: format_rfc3339(&m.created_at()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDto {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Session> for SessionDto {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.to_string(),
            created_at: format_rfc3339(&s.created_at),
            updated_at: format_rfc3339(&s.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDto {
    pub id: String,
    pub session_id: String,
    pub skill: String,
    pub input: String,
    pub output: String,
    pub status: String,
    pub error: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Task> for TaskDto {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id().to_string(),
            session_id: t.session_id().to_string(),
            skill: t.skill().to_owned(),
            input: t.input().to_owned(),
            output: t.output().to_owned(),
            status: t.status().to_string(),
            error: t.error().to_owned(),
            created_at: format_rfc3339(&t.created_at()),
            updated_at: format_rfc3339(&t.updated_at()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: String,
    pub channel: String,
    pub channel_id: String,
    pub created_at: String,
}

impl From<&User> for UserDto {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            channel: u.channel.to_string(),
            channel_id: u.channel_id.clone(),
            created_at: format_rfc3339(&u.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillDto {
    pub id: String,
    pub name: String,
    pub version: String,
    pub location: String,
    pub permissions: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: String,
}

impl From<&SkillRecord> for SkillDto {
    fn from(r: &SkillRecord) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name.clone(),
            version: r.version.to_string(),
            location: r.location.clone(),
            permissions: r.permissions.clone(),
            metadata: r.metadata.clone(),
            created_at: format_rfc3339(&r.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDto {
    pub id: String,
    pub skill: String,
    pub cron_expression: String,
    pub input: String,
    pub timezone: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Next fire time; `None` when disabled.
    pub next_run_at: Option<String>,
}

impl From<&Schedule> for ScheduleDto {
    fn from(s: &Schedule) -> Self {
        let now = ca_domain::time::now();
        Self {
            id: s.id.to_string(),
            skill: s.skill.clone(),
            cron_expression: s.cron_expression.to_string(),
            input: s.input.clone(),
            timezone: s.timezone.clone(),
            enabled: s.enabled,
            created_at: format_rfc3339(&s.created_at),
            updated_at: format_rfc3339(&s.updated_at),
            next_run_at: s.upcoming(&now, 1).first().map(format_rfc3339),
        }
    }
}

pub fn messages(list: &[Message]) -> Vec<MessageDto> {
    list.iter().map(MessageDto::from).collect()
}

pub fn sessions(list: &[Session]) -> Vec<SessionDto> {
    list.iter().map(SessionDto::from).collect()
}

pub fn tasks(list: &[Task]) -> Vec<TaskDto> {
    list.iter().map(TaskDto::from).collect()
}
