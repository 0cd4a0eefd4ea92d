//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path in `RELAY_CONFIG`), then applies `RELAY_BIND` and
//! `RELAY_LOG_LEVEL` env overrides. The vendor API key comes from
//! `GEMINI_API_KEY` and is never read from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::llm::ResponseFormat;

/// Default directive used when neither `system_prompt` nor `prompt_file`
/// is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an SVG programming expert.
Task: write one SVG image matching the user's description.
Strict requirements:
1. Output the code directly, do not wrap it in markdown (```).
2. No explanatory text.
3. Use pure red (#D90000) on a transparent background.
4. The root element must include viewBox=\"0 0 512 512\".";

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP listener to.
    pub bind: String,
}

/// Google Generative Language provider configuration (`[llm.gemini]`).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Scheme + host, without the API version segment.
    pub api_base_url: String,
    /// `v1` or `v1beta`. Model availability differs between the two.
    pub api_version: String,
    /// Model identifier placed in the request path.
    pub model: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// On a model-not-found rejection, list the models the key can use.
    pub diagnose_missing_model: bool,
}

/// Offline provider configuration (`[llm.dummy]`).
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Canned reply; `{{prompt}}` is replaced with the request content.
    pub reply: String,
}

/// LLM provider selection.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"` or `"dummy"`).
    pub provider: String,
    pub gemini: GeminiConfig,
    pub dummy: DummyConfig,
}

/// Relay behaviour: instruction template and extraction settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Response encoding requested from the vendor.
    pub response_format: ResponseFormat,
    /// Tag name of the fragment to extract (e.g. `svg`).
    pub fragment_tag: String,
    /// JSON field holding the fragment in structured replies.
    pub json_field: String,
    /// Media type of the returned data URL.
    pub mime_type: String,
    /// Fully-resolved instruction template (file contents already read).
    pub system_prompt: String,
}

/// Fully-resolved relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub relay: RelaySettings,
    /// API key from `GEMINI_API_KEY`, `None` when unset.
    pub api_key: Option<String>,
}

impl Config {
    /// Model identifier reported by the health endpoint.
    pub fn active_model(&self) -> &str {
        match self.llm.provider.as_str() {
            "dummy" => "dummy",
            _ => &self.llm.gemini.model,
        }
    }
}

/// Env-sourced values applied on top of the TOML file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub api_key: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("RELAY_BIND").ok(),
            log_level: env::var("RELAY_LOG_LEVEL").ok(),
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    relay: RawRelay,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    gemini: RawGemini,
    #[serde(default)]
    dummy: RawDummy,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            gemini: RawGemini::default(),
            dummy: RawDummy::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawGemini {
    #[serde(default = "default_gemini_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_gemini_api_version")]
    api_version: String,
    #[serde(default = "default_gemini_model")]
    model: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_true")]
    diagnose_missing_model: bool,
}

impl Default for RawGemini {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            api_version: default_gemini_api_version(),
            model: default_gemini_model(),
            timeout_seconds: default_timeout_seconds(),
            diagnose_missing_model: true,
        }
    }
}

#[derive(Deserialize)]
struct RawDummy {
    #[serde(default = "default_dummy_reply")]
    reply: String,
}

impl Default for RawDummy {
    fn default() -> Self {
        Self { reply: default_dummy_reply() }
    }
}

#[derive(Deserialize)]
struct RawRelay {
    #[serde(default)]
    response_format: ResponseFormat,
    #[serde(default = "default_fragment_tag")]
    fragment_tag: String,
    #[serde(default = "default_json_field")]
    json_field: String,
    #[serde(default = "default_mime_type")]
    mime_type: String,
    /// Inline template; takes precedence over `prompt_file`.
    #[serde(default)]
    system_prompt: Option<String>,
    /// Template file, relative to the config file's directory.
    #[serde(default)]
    prompt_file: Option<String>,
}

impl Default for RawRelay {
    fn default() -> Self {
        Self {
            response_format: ResponseFormat::default(),
            fragment_tag: default_fragment_tag(),
            json_field: default_json_field(),
            mime_type: default_mime_type(),
            system_prompt: None,
            prompt_file: None,
        }
    }
}

fn default_bind() -> String { "127.0.0.1:3000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "gemini".to_string() }
fn default_gemini_api_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_gemini_api_version() -> String { "v1".to_string() }
fn default_gemini_model() -> String { "gemini-1.5-flash".to_string() }
fn default_timeout_seconds() -> u64 { 120 }
fn default_dummy_reply() -> String {
    r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 512 512"><circle cx="256" cy="256" r="200" fill="#D90000"/></svg>"##.to_string()
}
fn default_fragment_tag() -> String { "svg".to_string() }
fn default_json_field() -> String { "svg_code".to_string() }
fn default_mime_type() -> String { "image/svg+xml".to_string() }

fn default_true() -> bool {
    true
}

/// Load config from `RELAY_CONFIG` or `config/default.toml`, then apply env overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("RELAY_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    load_from(Path::new(&path), Overrides::from_env())
}

/// Internal loader. Accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    resolve(parsed, &base_dir, overrides)
}

fn resolve(parsed: RawConfig, base_dir: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let r = parsed.relay;

    if r.fragment_tag.trim().is_empty() {
        return Err(AppError::Config("[relay].fragment_tag must not be empty".into()));
    }
    if r.json_field.trim().is_empty() {
        return Err(AppError::Config("[relay].json_field must not be empty".into()));
    }

    let system_prompt = match (r.system_prompt, r.prompt_file) {
        (Some(inline), _) => inline,
        (None, Some(file)) => {
            let prompt_path = resolve_relative(base_dir, &file);
            fs::read_to_string(&prompt_path).map_err(|e| {
                AppError::Config(format!("cannot read prompt file {}: {e}", prompt_path.display()))
            })?
        }
        (None, None) => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    let g = parsed.llm.gemini;

    Ok(Config {
        log_level: overrides.log_level.unwrap_or(parsed.server.log_level),
        server: ServerConfig {
            bind: overrides.bind.unwrap_or(parsed.server.bind),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            gemini: GeminiConfig {
                api_base_url: g.api_base_url.trim_end_matches('/').to_string(),
                api_version: g.api_version,
                model: g.model,
                timeout_seconds: g.timeout_seconds,
                diagnose_missing_model: g.diagnose_missing_model,
            },
            dummy: DummyConfig { reply: parsed.llm.dummy.reply },
        },
        relay: RelaySettings {
            response_format: r.response_format,
            fragment_tag: r.fragment_tag,
            json_field: r.json_field,
            mime_type: r.mime_type,
            system_prompt,
        },
        api_key: overrides.api_key,
    })
}

/// Absolute paths are returned unchanged; relative ones are joined onto `base`.
fn resolve_relative(base: &Path, file: &str) -> PathBuf {
    let p = PathBuf::from(file);
    if p.is_absolute() { p } else { base.join(p) }
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for tests — dummy provider, no API key, no external calls.
impl Config {
    pub fn test_default() -> Self {
        Self {
            log_level: "info".into(),
            server: ServerConfig { bind: "127.0.0.1:0".into() },
            llm: LlmConfig {
                provider: "dummy".into(),
                gemini: GeminiConfig {
                    api_base_url: "http://127.0.0.1:0".into(),
                    api_version: default_gemini_api_version(),
                    model: "test-model".into(),
                    timeout_seconds: 1,
                    diagnose_missing_model: true,
                },
                dummy: DummyConfig { reply: default_dummy_reply() },
            },
            relay: RelaySettings {
                response_format: ResponseFormat::Text,
                fragment_tag: default_fragment_tag(),
                json_field: default_json_field(),
                mime_type: default_mime_type(),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            api_key: None,
        }
    }
}
