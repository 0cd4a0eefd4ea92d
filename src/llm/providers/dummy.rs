//! Dummy LLM provider — replies with a canned text.
//! Used for running the relay offline and for tests without an API key.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: String,
}

impl DummyProvider {
    /// `reply` may contain `{{prompt}}`, replaced with the request content.
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }

    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        let text = self.reply.replace("{{prompt}}", content);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        Ok(text)
    }
}
