pub mod openai_compat;
pub mod traits;
pub mod unavailable;
pub(crate) mod sse;
pub(crate) mod util;

use std::sync::Arc;

use ca_domain::config::LlmConfig;
use ca_domain::error::Result;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
pub use unavailable::UnavailableProvider;
pub use util::resolve_api_key;

/// Build the configured provider. Fails when no API key can be resolved;
/// the caller decides whether that is fatal.
pub fn from_config(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(OpenAiCompatProvider::from_config(cfg)?))
}
