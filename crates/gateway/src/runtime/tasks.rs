//! Task dispatcher: runs a named skill in the context of a session and
//! records the invocation as a [`Task`].
//!
//! The task walks `pending -> running -> completed | failed`. Only task
//! creation is fatal; later status writes are logged and skipped when they
//! fail so that the caller always learns the real outcome.

use std::sync::Arc;

use serde_json::{Map, Value};

use ca_domain::cancel::CancelToken;
use ca_domain::error::{Error, Result};
use ca_domain::ids::SessionId;
use ca_domain::model::Task;
use ca_domain::trace::TraceEvent;
use ca_domain::value::TaskStatus;
use ca_sessions::Repositories;
use ca_skills::{ExecutionResult, SkillRuntime};

/// What the caller sees for one execution.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub result: ExecutionResult,
    /// The task as last recorded in memory (the stored copy may lag when a
    /// status write failed).
    pub task: Task,
}

pub struct TaskDispatcher {
    repos: Repositories,
    runtime: Arc<dyn SkillRuntime>,
}

impl TaskDispatcher {
    pub fn new(repos: Repositories, runtime: Arc<dyn SkillRuntime>) -> Self {
        Self { repos, runtime }
    }

    pub fn runtime(&self) -> &Arc<dyn SkillRuntime> {
        &self.runtime
    }

    /// Execute `skill` with `input` under `session_id`.
    ///
    /// Returns `Err(SkillRuntime)` when the runtime could not run the skill;
    /// the task is recorded as `failed` in that case too.
    pub async fn execute(
        &self,
        session_id: &SessionId,
        skill: &str,
        input: &Map<String, Value>,
        cancel: &CancelToken,
    ) -> Result<TaskOutcome> {
        cancel.checkpoint("load_session")?;
        self.repos.sessions.find_by_id(session_id).await?;

        // Map keys are ordered, so this is the canonical form.
        let input_json = serde_json::to_string(input)?;
        let task = Task::new(session_id.clone(), skill, input_json)?;

        cancel.checkpoint("create_task")?;
        let mut task = self.repos.tasks.create(task).await.map_err(|e| match e {
            Error::Repository(_) => e,
            other => Error::Repository(other.to_string()),
        })?;

        if let Err(canceled) = cancel.checkpoint("execute_skill") {
            self.transition(&mut task, |t| t.fail(canceled.to_string())).await;
            return Err(canceled);
        }

        self.transition(&mut task, |t| t.start()).await;

        let result = match self.runtime.execute(skill, input, cancel).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                self.transition(&mut task, |t| t.fail(message)).await;
                return Err(match e {
                    Error::SkillRuntime(_) | Error::Canceled(_) => e,
                    other => Error::SkillRuntime(other.to_string()),
                });
            }
        };

        if result.success {
            let output = result.output.clone();
            self.transition(&mut task, |t| t.complete(output)).await;
        } else {
            let error = result.error.clone();
            self.transition(&mut task, |t| t.fail(error)).await;
        }

        Ok(TaskOutcome { result, task })
    }

    /// Apply a transition and persist it. Persistence failures are logged.
    async fn transition(&self, task: &mut Task, step: impl FnOnce(&mut Task) -> Result<()>) {
        let from = task.status();
        if let Err(e) = step(task) {
            tracing::warn!(task_id = %task.id(), error = %e, "task transition rejected");
            return;
        }
        trace_transition(task, from);
        if let Err(e) = self.repos.tasks.update(task).await {
            tracing::warn!(
                task_id = %task.id(),
                status = %task.status(),
                error = %e,
                "failed to persist task status"
            );
        }
    }
}

fn trace_transition(task: &Task, from: TaskStatus) {
    TraceEvent::TaskTransition {
        task_id: task.id().to_string(),
        session_id: task.session_id().to_string(),
        skill: task.skill().to_owned(),
        from: from.to_string(),
        to: task.status().to_string(),
    }
    .emit();
}
