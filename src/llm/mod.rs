//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery.

pub mod providers;

use serde::Deserialize;
use thiserror::Error;

// ── Response format ───────────────────────────────────────────────────────────

/// Encoding requested from the vendor for the generated text.
///
/// `Json` maps to `responseMimeType = "application/json"`. Whether the model
/// honours it depends on the model version, so extraction never relies on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json",
        }
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
    /// Connect, timeout, or body decode failure.
    #[error("provider request failed: {0}")]
    Transport(String),
    /// Vendor answered with a non-2xx status.
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },
    /// Vendor rejected the model identifier. `available` is filled in when
    /// the model list could be fetched.
    #[error("model not found: {model} ({message}){}", format_available(.available))]
    ModelNotFound {
        model: String,
        message: String,
        available: Option<Vec<String>>,
    },
    #[error("provider returned empty content")]
    EmptyContent,
}

fn format_available(available: &Option<Vec<String>>) -> String {
    match available {
        Some(models) if models.is_empty() => "; no usable models are available for this key".into(),
        Some(models) => format!("; available models: {}", models.join(", ")),
        None => String::new(),
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    Gemini(providers::gemini::GeminiProvider),
}

impl LlmProvider {
    /// Send `content` to the provider and return its text reply.
    pub async fn complete(&self, content: &str, format: ResponseFormat) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content).await,
            LlmProvider::Gemini(p) => p.complete(content, format).await,
        }
    }

    /// Short backend name for logs and the health endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::Gemini(_) => "gemini",
        }
    }
}
