//! AppState construction and background-task spawning, shared by `serve`
//! and `run` so the CLI can drive the pipeline without an HTTP listener.

use std::sync::Arc;

use anyhow::Context;

use ca_domain::config::{Config, ConfigSeverity, LlmStartupPolicy};
use ca_providers::{LlmProvider, UnavailableProvider};
use ca_sessions::{ConversationStore, Repositories};
use ca_skills::{LocalRuntime, SkillRuntime, SkillsRegistry};

use crate::runtime::schedules::ScheduleStore;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Conversation store ───────────────────────────────────────────
    let store = if config.storage.persist {
        let path = &config.storage.state_path;
        Arc::new(
            ConversationStore::open(path)
                .with_context(|| format!("opening conversation store at {}", path.display()))?,
        )
    } else {
        tracing::info!("storage.persist = false, conversations kept in memory only");
        Arc::new(ConversationStore::in_memory())
    };
    let repos = Repositories::from_store(store.clone());

    // ── Schedules ────────────────────────────────────────────────────
    let schedules = if config.storage.persist {
        Arc::new(
            ScheduleStore::open(&config.storage.state_path).context("loading schedules")?,
        )
    } else {
        Arc::new(ScheduleStore::in_memory())
    };
    tracing::info!(count = schedules.len(), "schedule store ready");

    // ── LLM provider ─────────────────────────────────────────────────
    let provider = build_provider(&config)?;

    // ── Skills ───────────────────────────────────────────────────────
    let skills = Arc::new(
        SkillsRegistry::load(&config.skills.path)
            .with_context(|| format!("loading skills from {}", config.skills.path.display()))?,
    );
    let runtime: Arc<dyn SkillRuntime> = if config.skills.builtins {
        Arc::new(LocalRuntime::with_builtins(skills.clone()))
    } else {
        Arc::new(LocalRuntime::new(skills.clone()))
    };
    tracing::info!(skills_count = skills.list().len(), "skill runtime ready");

    Ok(AppState::new(
        config, store, repos, provider, skills, runtime, schedules,
    ))
}

/// The configured provider, or a stand-in that fails every call when no
/// API key is available and the startup policy allows that.
fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    match ca_providers::from_config(&config.llm) {
        Ok(provider) => {
            tracing::info!(
                provider = provider.provider_id(),
                model = provider.default_model(),
                "LLM provider ready"
            );
            Ok(provider)
        }
        Err(e) => match config.llm.startup_policy {
            LlmStartupPolicy::RequireOne => Err(anyhow::Error::new(e)
                .context("initializing LLM provider (startup_policy = require_one)")),
            LlmStartupPolicy::AllowNone => {
                tracing::warn!(
                    error = %e,
                    "no LLM provider available, chat requests will fail until an API key is configured"
                );
                Ok(Arc::new(UnavailableProvider::new(
                    config.llm.provider_id.clone(),
                    config.llm.default_model.clone(),
                    e.to_string(),
                )))
            }
        },
    }
}

/// Write the conversation store to disk. Blocking I/O runs off the
/// executor.
pub async fn flush_store(state: &AppState) {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "conversation store flush failed"),
        Err(e) => tracing::warn!(error = %e, "conversation store flush task panicked"),
    }
}

/// Spawn the long-running background tokio tasks (periodic store flush).
pub fn spawn_background_tasks(state: &AppState) {
    let secs = state.config.storage.flush_interval_secs;
    if !state.config.storage.persist || secs == 0 {
        tracing::info!("periodic store flush disabled");
        return;
    }

    // ── Periodic conversation flush ──────────────────────────────────
    let state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            flush_store(&state).await;
        }
    });

    tracing::info!(interval_secs = secs, "background tasks spawned");
}
