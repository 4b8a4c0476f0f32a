use std::sync::Arc;
use std::time::{Duration, Instant};

use ca_domain::cancel::CancelToken;
use ca_domain::config::Config;
use ca_domain::value::Channel;
use ca_providers::LlmProvider;
use ca_sessions::{ConversationStore, Repositories};
use ca_skills::{SkillRuntime, SkillsRegistry};

use crate::runtime::schedules::ScheduleStore;
use crate::runtime::{Orchestrator, TaskDispatcher};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, LLM provider
/// - **Storage**: conversation store, repositories, schedules
/// - **Skills**: registry and runtime
/// - **Pipelines**: orchestrator and task dispatcher built from the above
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub provider: Arc<dyn LlmProvider>,

    // ── Storage ───────────────────────────────────────────────────────
    /// Backing store, flushed periodically and at shutdown.
    pub store: Arc<ConversationStore>,
    /// Repository handles the pipelines use. Normally views of `store`.
    pub repos: Repositories,
    pub schedules: Arc<ScheduleStore>,

    // ── Skills ────────────────────────────────────────────────────────
    pub skills: Arc<SkillsRegistry>,
    pub runtime: Arc<dyn SkillRuntime>,

    // ── Pipelines ─────────────────────────────────────────────────────
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Arc<TaskDispatcher>,

    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<ConversationStore>,
        repos: Repositories,
        provider: Arc<dyn LlmProvider>,
        skills: Arc<SkillsRegistry>,
        runtime: Arc<dyn SkillRuntime>,
        schedules: Arc<ScheduleStore>,
    ) -> Self {
        let default_channel =
            Channel::parse(&config.identity.default_channel).unwrap_or_default();
        let orchestrator = Orchestrator::new(repos.clone(), provider.clone(), default_channel)
            .with_system_prompt(config.llm.system_prompt.clone());
        let dispatcher = TaskDispatcher::new(repos.clone(), runtime.clone());
        Self {
            config,
            provider,
            store,
            repos,
            schedules,
            skills,
            runtime,
            orchestrator: Arc::new(orchestrator),
            dispatcher: Arc::new(dispatcher),
            started_at: Instant::now(),
        }
    }

    /// A fresh token for one request, bounded by `server.request_timeout_ms`.
    pub fn request_token(&self) -> CancelToken {
        match self.config.server.request_timeout_ms {
            0 => CancelToken::new(),
            ms => CancelToken::with_timeout(Duration::from_millis(ms)),
        }
    }
}
