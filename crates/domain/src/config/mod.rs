mod llm;
mod observability;
mod server;
mod storage;

pub use llm::*;
pub use observability::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::value::Channel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Skills
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Directory scanned for `<name>/skill.toml` manifests.
    #[serde(default = "d_skills_path")]
    pub path: PathBuf,
    /// Register the in-process `echo` and `time.now` skills.
    #[serde(default = "d_true")]
    pub builtins: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            path: d_skills_path(),
            builtins: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Channel assumed for HTTP callers that do not name one.
    #[serde(default = "d_default_channel")]
    pub default_channel: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_channel: d_default_channel(),
        }
    }
}

fn d_skills_path() -> PathBuf {
    PathBuf::from("./skills")
}
fn d_true() -> bool {
    true
}
fn d_default_channel() -> String {
    "web".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: String| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message,
            });
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0".into());
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty".into());
        }
        if self.server.request_timeout_ms == 0 {
            push(
                ConfigSeverity::Error,
                "server.request_timeout_ms",
                "request timeout must be greater than 0".into(),
            );
        }
        if self.server.max_concurrent_requests == 0 {
            push(
                ConfigSeverity::Error,
                "server.max_concurrent_requests",
                "concurrency limit must be greater than 0".into(),
            );
        }
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)".into(),
            );
        }

        if self.llm.provider_id.is_empty() {
            push(ConfigSeverity::Error, "llm.provider_id", "provider id must not be empty".into());
        }
        if self.llm.base_url.is_empty() {
            push(ConfigSeverity::Error, "llm.base_url", "base_url must not be empty".into());
        } else if !self.llm.base_url.starts_with("http://")
            && !self.llm.base_url.starts_with("https://")
        {
            push(
                ConfigSeverity::Error,
                "llm.base_url",
                "base_url must use http or https".into(),
            );
        }
        if self.llm.default_model.is_empty() {
            push(ConfigSeverity::Error, "llm.default_model", "default model must not be empty".into());
        }
        if self.llm.timeout_ms == 0 {
            push(ConfigSeverity::Error, "llm.timeout_ms", "timeout must be greater than 0".into());
        }
        if self.llm.default_max_tokens == Some(0) {
            push(
                ConfigSeverity::Error,
                "llm.default_max_tokens",
                "max tokens must be greater than 0".into(),
            );
        }
        if self.llm.api_key.is_some() {
            push(
                ConfigSeverity::Warning,
                "llm.api_key",
                format!("plaintext API key in config; prefer the {} env var", self.llm.api_key_env),
            );
        }

        if self.storage.persist && self.storage.state_path.as_os_str().is_empty() {
            push(ConfigSeverity::Error, "storage.state_path", "state path must not be empty".into());
        }

        if let Err(e) = Channel::parse(&self.identity.default_channel) {
            push(ConfigSeverity::Error, "identity.default_channel", e.to_string());
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            push(
                ConfigSeverity::Error,
                "observability.sample_rate",
                "sample rate must be within 0.0..=1.0".into(),
            );
        }

        errors
    }

    /// True when any issue is an error (warnings do not block startup).
    pub fn has_errors(issues: &[ConfigError]) -> bool {
        issues.iter().any(|e| e.severity == ConfigSeverity::Error)
    }
}
