//! The relay: prompt in, SVG data URL out.
//!
//! ```text
//! prompt ─► InstructionTemplate ─► LlmProvider ─► ExtractorChain ─► DataUrl
//! ```
//!
//! Every call is independent; the relay holds only immutable configuration
//! and a cloneable provider handle. Failures are typed ([`RelayError`]) and
//! flattened into an [`Outcome`] envelope at the HTTP boundary.

pub mod data_url;
pub mod extract;
pub mod prompt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{LlmProvider, ProviderError, ResponseFormat, providers};

pub use data_url::DataUrl;
use extract::ExtractorChain;
use prompt::InstructionTemplate;

/// Longest slice of raw model output written to the log on extraction failure.
const RAW_PREVIEW_CHARS: usize = 2000;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure category, serialised as `errorKind` in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Upstream,
    EmptyContent,
    Extraction,
    ModelNotFound,
    Transport,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("no <{tag}> fragment found in model response")]
    Extraction { tag: String },

    #[error("model '{model}' not found: {message}{}", list_suffix(.available))]
    ModelNotFound {
        model: String,
        message: String,
        available: Option<Vec<String>>,
    },

    #[error("could not reach model provider: {0}")]
    Transport(String),
}

fn list_suffix(available: &Option<Vec<String>>) -> String {
    match available {
        Some(models) if models.is_empty() => "; no usable models are available for this API key".into(),
        Some(models) => format!("; usable models: {}", models.join(", ")),
        None => String::new(),
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Upstream { .. } => ErrorKind::Upstream,
            RelayError::EmptyContent => ErrorKind::EmptyContent,
            RelayError::Extraction { .. } => ErrorKind::Extraction,
            RelayError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            RelayError::Transport(_) => ErrorKind::Transport,
        }
    }
}

impl From<ProviderError> for RelayError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Upstream { status, message } => RelayError::Upstream { status, message },
            ProviderError::EmptyContent => RelayError::EmptyContent,
            ProviderError::ModelNotFound { model, message, available } => {
                RelayError::ModelNotFound { model, message, available }
            }
            ProviderError::Transport(msg) => RelayError::Transport(msg),
            // Startup-time errors; only reachable if a provider is built lazily.
            e @ (ProviderError::UnknownProvider(_) | ProviderError::Misconfigured(_)) => {
                RelayError::Transport(e.to_string())
            }
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Uniform response body. Exactly one of `image_url` / `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Outcome {
    pub fn ok(url: DataUrl) -> Self {
        Self {
            success: true,
            image_url: Some(url.into_string()),
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(err: &RelayError) -> Self {
        Self {
            success: false,
            image_url: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

impl From<Result<DataUrl, RelayError>> for Outcome {
    fn from(result: Result<DataUrl, RelayError>) -> Self {
        match result {
            Ok(url) => Outcome::ok(url),
            Err(e) => Outcome::failed(&e),
        }
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// Construction-time settings for a [`Relay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Model identifier, for logs and health output.
    pub model: String,
    pub response_format: ResponseFormat,
    pub template: InstructionTemplate,
    pub fragment_tag: String,
    pub json_field: String,
    /// Media type of the returned data URL.
    pub mime_type: String,
}

impl RelayConfig {
    pub fn from_config(config: &Config) -> Self {
        let r = &config.relay;
        Self {
            model: config.active_model().to_string(),
            response_format: r.response_format,
            template: InstructionTemplate::new(r.system_prompt.clone()),
            fragment_tag: r.fragment_tag.clone(),
            json_field: r.json_field.clone(),
            mime_type: r.mime_type.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    provider: LlmProvider,
    extractors: ExtractorChain,
}

impl Relay {
    pub fn new(config: RelayConfig, provider: LlmProvider) -> Result<Self, AppError> {
        let extractors = ExtractorChain::standard(&config.fragment_tag, &config.json_field)
            .map_err(|e| AppError::Config(format!("invalid fragment tag '{}': {e}", config.fragment_tag)))?;
        Ok(Self { config, provider, extractors })
    }

    /// Build the provider named in `config` and wrap it in a relay.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm, config.api_key.clone())?;
        Self::new(RelayConfig::from_config(config), provider)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run one prompt through the model and return the fragment as a data URL.
    pub async fn generate(&self, prompt: &str) -> Result<DataUrl, RelayError> {
        let format = self.config.response_format;
        let instruction = self.config.template.render_for(prompt, format, &self.config.json_field);

        debug!(
            model = %self.config.model,
            format = format.as_str(),
            prompt_len = prompt.len(),
            instruction_len = instruction.len(),
            "relaying prompt"
        );

        let raw = self.provider.complete(&instruction, format).await?;

        let Some(extraction) = self.extractors.extract(&raw) else {
            warn!(
                model = %self.config.model,
                raw_len = raw.len(),
                raw = %preview(&raw),
                "no fragment found in model response"
            );
            return Err(RelayError::Extraction { tag: self.config.fragment_tag.clone() });
        };

        debug!(
            strategy = extraction.strategy,
            fragment_len = extraction.fragment.len(),
            "fragment extracted"
        );

        Ok(DataUrl::encode(&self.config.mime_type, extraction.fragment.as_bytes()))
    }

    /// [`generate`](Self::generate), flattened into the response envelope.
    pub async fn handle(&self, prompt: &str) -> Outcome {
        self.generate(prompt).await.into()
    }
}

/// First [`RAW_PREVIEW_CHARS`] characters of `raw`, on a char boundary.
fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    fn relay_replying(reply: &str) -> Relay {
        let mut cfg = RelayConfig::from_config(&Config::test_default());
        cfg.template = InstructionTemplate::new("Draw {{prompt}}");
        Relay::new(cfg, LlmProvider::Dummy(DummyProvider::new(reply))).unwrap()
    }

    #[tokio::test]
    async fn freeform_reply_becomes_data_url() {
        let fragment = r#"<svg viewBox="0 0 512 512"><circle r="5"/></svg>"#;
        let relay = relay_replying(&format!("Here you go:\n{fragment}"));
        let url = relay.generate("a cat").await.unwrap();
        assert_eq!(url, DataUrl::svg(fragment));

        let (_, bytes) = DataUrl::decode(url.as_str()).unwrap();
        assert_eq!(bytes, fragment.as_bytes());
    }

    #[tokio::test]
    async fn structured_reply_uses_field() {
        let relay = relay_replying(r#"{"svg_code":"<svg></svg>"}"#);
        let url = relay.generate("a cat").await.unwrap();
        assert_eq!(url.as_str(), "data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=");
    }

    #[tokio::test]
    async fn prose_reply_is_extraction_failure() {
        let relay = relay_replying("I'd rather describe a cat in words.");
        let err = relay.generate("a cat").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("<svg>"));
    }

    #[tokio::test]
    async fn prompt_reaches_provider() {
        // Dummy reply echoes the instruction, so the rendered prompt lands inside the svg.
        let relay = relay_replying("<svg>{{prompt}}</svg>");
        let url = relay.generate("a cat").await.unwrap();
        assert_eq!(url, DataUrl::svg("<svg>Draw a cat</svg>"));
    }

    #[tokio::test]
    async fn empty_reply_is_empty_content() {
        let relay = relay_replying("");
        let out = relay.handle("a cat").await;
        assert!(!out.success);
        assert_eq!(out.error_kind, Some(ErrorKind::EmptyContent));
    }

    #[tokio::test]
    async fn outcome_has_exactly_one_payload() {
        for reply in ["<svg/></svg>", "nothing here", "", r#"{"svg_code":"<svg/>"}"#] {
            let out = relay_replying(reply).handle("p").await;
            assert_ne!(out.image_url.is_some(), out.error.is_some(), "reply {reply:?}");
            assert_eq!(out.success, out.image_url.is_some());
            assert_eq!(out.error.is_some(), out.error_kind.is_some());
        }
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let ok = serde_json::to_value(Outcome::ok(DataUrl::svg("<svg/>"))).unwrap();
        assert_eq!(ok["success"], true);
        assert!(ok["imageUrl"].as_str().unwrap().starts_with("data:image/svg+xml;base64,"));
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(Outcome::failed(&RelayError::EmptyContent)).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["errorKind"], "empty_content");
        assert!(err.get("imageUrl").is_none());
    }

    #[test]
    fn provider_errors_map_to_kinds() {
        let cases = [
            (ProviderError::Upstream { status: 500, message: "boom".into() }, ErrorKind::Upstream),
            (ProviderError::EmptyContent, ErrorKind::EmptyContent),
            (ProviderError::Transport("refused".into()), ErrorKind::Transport),
            (
                ProviderError::ModelNotFound { model: "m".into(), message: "gone".into(), available: None },
                ErrorKind::ModelNotFound,
            ),
            (ProviderError::Misconfigured("no key".into()), ErrorKind::Transport),
        ];
        for (provider_err, kind) in cases {
            assert_eq!(RelayError::from(provider_err).kind(), kind);
        }
    }

    #[test]
    fn model_not_found_lists_models() {
        let e = RelayError::ModelNotFound {
            model: "gemini-x".into(),
            message: "unknown model".into(),
            available: Some(vec!["gemini-1.5-flash".into()]),
        };
        assert_eq!(
            e.to_string(),
            "model 'gemini-x' not found: unknown model; usable models: gemini-1.5-flash"
        );
    }

    #[test]
    fn model_not_found_keeps_vendor_message() {
        let e = RelayError::from(ProviderError::ModelNotFound {
            model: "gemini-x".into(),
            message: "models/gemini-x is not found for API version v1".into(),
            available: None,
        });
        assert_eq!(
            e.to_string(),
            "model 'gemini-x' not found: models/gemini-x is not found for API version v1"
        );
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(RAW_PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).chars().count(), RAW_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
