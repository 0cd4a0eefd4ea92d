//! Google Generative Language provider (`models/{model}:generateContent`).
//!
//! All vendor wire types are private to this module; callers only see
//! text or a [`ProviderError`]. One round-trip per call; nothing is retried.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::llm::{ProviderError, ResponseFormat};

// ── Public provider ───────────────────────────────────────────────────────────

/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
    api_version: String,
    model: String,
    api_key: String,
    diagnose_missing_model: bool,
}

// Manual impl keeps the API key out of debug output.
impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("diagnose_missing_model", &self.diagnose_missing_model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    pub fn new(
        api_base_url: String,
        api_version: String,
        model: String,
        timeout_seconds: u64,
        api_key: String,
        diagnose_missing_model: bool,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_version,
            model,
            api_key,
            diagnose_missing_model,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.api_base_url, self.api_version, self.model
        )
    }

    fn list_models_url(&self) -> String {
        format!("{}/{}/models", self.api_base_url, self.api_version)
    }

    /// Send `content` as a single user turn and return the concatenated text
    /// of the first candidate.
    pub async fn complete(&self, content: &str, format: ResponseFormat) -> Result<String, ProviderError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: content.to_string() }],
            }],
            generation_config: match format {
                ResponseFormat::Text => None,
                ResponseFormat::Json => Some(GenerationConfig {
                    response_mime_type: "application/json",
                }),
            },
        };

        debug!(
            model = %self.model,
            api_version = %self.api_version,
            format = format.as_str(),
            content_len = content.len(),
            "sending generateContent request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full generateContent payload");
        }

        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let e = redact(e);
                error!(model = %self.model, error = %e, "generateContent transport failure");
                ProviderError::Transport(e)
            })?;

        let response = match self.check_status("generateContent", response).await {
            Ok(r) => r,
            Err(ProviderError::ModelNotFound { model, message, .. }) if self.diagnose_missing_model => {
                warn!(%model, "model rejected by vendor, listing usable models");
                let available = match self.list_models().await {
                    Ok(models) => Some(models),
                    Err(e) => {
                        warn!(error = %e, "model listing failed");
                        None
                    }
                };
                return Err(ProviderError::ModelNotFound { model, message, available });
            }
            Err(e) => return Err(e),
        };

        let parsed = response.json::<GenerateContentResponse>().await.map_err(|e| {
            let e = redact(e);
            error!(error = %e, "failed to deserialize generateContent response");
            ProviderError::Transport(format!("failed to parse response body: {e}"))
        })?;

        if let Some(feedback) = &parsed.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                warn!(%reason, "prompt blocked by vendor");
            }
        }

        let candidate = parsed.candidates.into_iter().next();
        if let Some(reason) = candidate.as_ref().and_then(|c| c.finish_reason.as_deref()) {
            debug!(finish_reason = %reason, "received generateContent response");
        }

        let text: String = candidate
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        Ok(text)
    }

    /// List models usable with `generateContent` for this API key.
    ///
    /// Names are returned without the `models/` prefix, in vendor order.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(self.list_models_url())
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(redact(e)))?;

        let response = self.check_status("listModels", response).await?;
        let parsed = response
            .json::<ListModelsResponse>()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to parse model list: {}", redact(e))))?;

        Ok(parsed
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
            .map(|m| m.name.strip_prefix("models/").map(str::to_string).unwrap_or(m.name))
            .collect())
    }

    /// Return the response if successful, or a structured error.
    /// `operation` names the vendor method in logs.
    async fn check_status(
        &self,
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read error body>".to_string());

        let (message, vendor_status) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(env) => (env.error.message, env.error.status),
            Err(_) => (body, None),
        };

        error!(operation, %status, %message, "vendor returned HTTP error");

        let not_found = status == reqwest::StatusCode::NOT_FOUND || vendor_status.as_deref() == Some("NOT_FOUND");
        if not_found {
            return Err(ProviderError::ModelNotFound {
                model: self.model.clone(),
                message,
                available: None,
            });
        }

        Err(ProviderError::Upstream { status: status.as_u16(), message })
    }
}

/// reqwest errors embed the request URL, which carries the API key.
fn redact(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

// Error envelope used by Google APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}
