//! Shared utility functions for provider adapters.

use ca_domain::config::LlmConfig;
use ca_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key: plaintext `api_key` first (with a warning), then
/// the `api_key_env` variable. Empty values count as missing.
pub fn resolve_api_key(cfg: &LlmConfig) -> Result<String> {
    if let Some(key) = cfg.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        tracing::warn!("API key loaded from plaintext config field 'llm.api_key'; prefer the env var");
        return Ok(key.to_owned());
    }
    match std::env::var(&cfg.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Config(format!(
            "no API key configured: set llm.api_key or the {} environment variable",
            cfg.api_key_env
        ))),
    }
}
