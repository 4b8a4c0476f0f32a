//! Skill execution.
//!
//! `SkillRuntime` is the port the gateway talks to. `LocalRuntime` is the
//! in-process implementation: it resolves names through the
//! [`SkillsRegistry`] and runs the [`SkillHandler`] registered for them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ca_domain::cancel::CancelToken;
use ca_domain::error::{Error, Result};
use ca_domain::model::SkillRecord;

use crate::registry::{SkillsRegistry, BUILTIN_LOCATION_PREFIX};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a skill reported. `success: false` is an application outcome, not
/// a runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: String,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abstract skill executor.
///
/// `execute` returns `Err(Error::SkillRuntime)` (or `Canceled`) only when
/// the skill could not be run at all.
#[async_trait::async_trait]
pub trait SkillRuntime: Send + Sync {
    async fn execute(
        &self,
        name: &str,
        input: &Map<String, Value>,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult>;

    /// `Ok` when `name` is known and executable.
    async fn validate(&self, name: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<SkillRecord>>;

    async fn get_skill(&self, name: &str) -> Result<SkillRecord>;
}

/// In-process implementation of one skill.
#[async_trait::async_trait]
pub trait SkillHandler: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, input: &Map<String, Value>) -> Result<ExecutionResult>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LocalRuntime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LocalRuntime {
    registry: Arc<SkillsRegistry>,
    handlers: RwLock<HashMap<String, Arc<dyn SkillHandler>>>,
}

impl LocalRuntime {
    pub fn new(registry: Arc<SkillsRegistry>) -> Self {
        Self {
            registry,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Runtime with the `echo` and `time.now` handlers installed.
    pub fn with_builtins(registry: Arc<SkillsRegistry>) -> Self {
        let runtime = Self::new(registry);
        for handler in crate::builtins::all() {
            if let Err(e) = runtime.install(handler) {
                tracing::warn!(error = %e, "builtin skill not installed");
            }
        }
        runtime
    }

    /// Register a handler and its registry record.
    pub fn install(&self, handler: Arc<dyn SkillHandler>) -> Result<SkillRecord> {
        let name = handler.name().to_owned();
        let mut record = SkillRecord::new(
            &name,
            handler.version(),
            format!("{BUILTIN_LOCATION_PREFIX}{name}"),
        )?;
        if !handler.description().is_empty() {
            record.metadata.insert(
                "description".into(),
                Value::String(handler.description().to_owned()),
            );
        }
        let record = self.registry.register(record)?;
        self.handlers.write().insert(name, handler);
        Ok(record)
    }

    pub fn registry(&self) -> &Arc<SkillsRegistry> {
        &self.registry
    }

    fn handler(&self, name: &str) -> Option<Arc<dyn SkillHandler>> {
        self.handlers.read().get(name).cloned()
    }
}

#[async_trait::async_trait]
impl SkillRuntime for LocalRuntime {
    async fn execute(
        &self,
        name: &str,
        input: &Map<String, Value>,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        if !self.registry.contains(name) {
            return Err(Error::SkillRuntime(format!("unknown skill: {name}")));
        }
        let handler = self
            .handler(name)
            .ok_or_else(|| Error::SkillRuntime(format!("no executor available for skill: {name}")))?;

        tracing::debug!(skill = name, "executing skill");
        cancel
            .run("skill", handler.call(input))
            .await
            .map_err(|e| match e {
                Error::Canceled(_) | Error::SkillRuntime(_) => e,
                other => Error::SkillRuntime(format!("{name}: {other}")),
            })
    }

    async fn validate(&self, name: &str) -> Result<()> {
        self.registry.require(name)?;
        if self.handler(name).is_none() {
            return Err(Error::validation(format!(
                "skill {name} is registered but has no executor"
            )));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SkillRecord>> {
        Ok(self.registry.list())
    }

    async fn get_skill(&self, name: &str) -> Result<SkillRecord> {
        self.registry.require(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_domain::model::SkillRecord;

    struct Boom;

    #[async_trait::async_trait]
    impl SkillHandler for Boom {
        fn name(&self) -> &str {
            "boom"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn description(&self) -> &str {
            ""
        }
        async fn call(&self, _input: &Map<String, Value>) -> Result<ExecutionResult> {
            Err(Error::Io(std::io::Error::other("pipe closed")))
        }
    }

    fn runtime() -> LocalRuntime {
        LocalRuntime::with_builtins(Arc::new(SkillsRegistry::empty()))
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let rt = runtime();
        let mut input = Map::new();
        input.insert("x".into(), Value::from(1));
        let res = rt.execute("echo", &input, &CancelToken::new()).await.unwrap();
        assert_eq!(res, ExecutionResult::ok(r#"{"x":1}"#));
    }

    #[tokio::test]
    async fn unknown_skill_is_a_runtime_error() {
        let rt = runtime();
        let err = rt
            .execute("nope", &Map::new(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SkillRuntime(_)));
        assert!(rt.validate("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn record_without_handler_cannot_run() {
        let rt = runtime();
        rt.registry()
            .register(SkillRecord::new("weather", "1.0.0", "/skills/weather").unwrap())
            .unwrap();
        assert!(rt.validate("weather").await.is_err());
        let err = rt
            .execute("weather", &Map::new(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no executor"));
    }

    #[tokio::test]
    async fn handler_errors_become_runtime_errors() {
        let rt = runtime();
        rt.install(Arc::new(Boom)).unwrap();
        let err = rt
            .execute("boom", &Map::new(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SkillRuntime(ref m) if m.contains("pipe closed")));
    }

    #[tokio::test]
    async fn cancelled_token_skips_execution() {
        let rt = runtime();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = rt.execute("echo", &Map::new(), &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Canceled(_)));
    }

    #[tokio::test]
    async fn builtins_are_listed() {
        let rt = runtime();
        let names: Vec<String> = rt.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["echo", "time.now"]);
        assert_eq!(rt.get_skill("echo").await.unwrap().location, "builtin:echo");
    }
}
