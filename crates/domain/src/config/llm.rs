use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The single OpenAI-compatible endpoint replies are generated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_provider_id")]
    pub provider_id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Plaintext key; takes precedence over `api_key_env`. Prefer the env var.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_model")]
    pub default_model: String,
    #[serde(default)]
    pub default_max_tokens: Option<u32>,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Prepended to every assembled history; never persisted.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: d_provider_id(),
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            api_key: None,
            default_model: d_model(),
            default_max_tokens: None,
            timeout_ms: d_timeout_ms(),
            system_prompt: None,
            startup_policy: LlmStartupPolicy::AllowNone,
        }
    }
}

/// Controls how the gateway handles a missing LLM credential at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot anyway; `/chat/send` answers with a provider error until a
    /// key is configured.
    #[default]
    AllowNone,
    /// Abort startup when the provider cannot be initialized.
    RequireOne,
}

fn d_provider_id() -> String {
    "openai".into()
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_timeout_ms() -> u64 {
    120_000
}
