use ca_domain::cancel::CancelToken;
use ca_domain::error::{Error, Result};
use ca_domain::stream::{BoxStream, StreamEvent};

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// Stand-in used when the real provider could not be initialized (usually
/// a missing API key). Every call fails with a provider error carrying the
/// original reason, so the rest of the gateway keeps working.
pub struct UnavailableProvider {
    id: String,
    default_model: String,
    reason: String,
}

impl UnavailableProvider {
    pub fn new(id: impl Into<String>, default_model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_model: default_model.into(),
            reason: reason.into(),
        }
    }

    fn error(&self) -> Error {
        Error::provider(&self.id, format!("provider unavailable: {}", self.reason))
    }
}

#[async_trait::async_trait]
impl LlmProvider for UnavailableProvider {
    async fn chat(&self, _req: &ChatRequest, cancel: &CancelToken) -> Result<ChatResponse> {
        cancel.checkpoint("llm")?;
        Err(self.error())
    }

    async fn chat_stream(
        &self,
        _req: &ChatRequest,
        cancel: &CancelToken,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        cancel.checkpoint("llm stream")?;
        Err(self.error())
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
