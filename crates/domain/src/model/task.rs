use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{SessionId, TaskId};
use crate::value::TaskStatus;

const EMPTY_OUTPUT: &str = "null";
const EMPTY_ERROR: &str = "skill failed without an error message";

/// A record of one skill invocation.
///
/// `output` is set only when entering `completed` and `error` only when
/// entering `failed`; both are non-empty in exactly those states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    session_id: SessionId,
    skill: String,
    input: String,
    output: String,
    status: TaskStatus,
    error: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(session_id: SessionId, skill: impl Into<String>, input: impl Into<String>) -> Result<Self> {
        let skill = skill.into();
        super::validate_skill_name(&skill)?;
        let now = crate::time::now();
        Ok(Self {
            id: TaskId::generate(),
            session_id,
            skill,
            input: input.into(),
            output: String::new(),
            status: TaskStatus::Pending,
            error: String::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::validation(format!(
                "illegal task transition {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = crate::time::now().max(self.created_at);
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(TaskStatus::Running)
    }

    /// An empty output is recorded as `"null"`.
    pub fn complete(&mut self, output: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Completed)?;
        let output = output.into();
        self.output = if output.is_empty() { EMPTY_OUTPUT.into() } else { output };
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        let error = error.into();
        self.error = if error.trim().is_empty() { EMPTY_ERROR.into() } else { error };
        Ok(())
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
    pub fn skill(&self) -> &str {
        &self.skill
    }
    pub fn input(&self) -> &str {
        &self.input
    }
    pub fn output(&self) -> &str {
        &self.output
    }
    pub fn status(&self) -> TaskStatus {
        self.status
    }
    pub fn error(&self) -> &str {
        &self.error
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
