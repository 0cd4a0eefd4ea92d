//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod gemini;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `GEMINI_API_KEY` env (never TOML). The gemini
/// backend refuses to start without one; the dummy backend ignores it.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::new(config.dummy.reply.clone()))),
        "gemini" => {
            let key = api_key.ok_or_else(|| {
                ProviderError::Misconfigured("GEMINI_API_KEY is not set".to_string())
            })?;
            let g = &config.gemini;
            let p = gemini::GeminiProvider::new(
                g.api_base_url.clone(),
                g.api_version.clone(),
                g.model.clone(),
                g.timeout_seconds,
                key,
                g.diagnose_missing_model,
            )?;
            Ok(LlmProvider::Gemini(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
