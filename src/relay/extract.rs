//! Fragment extraction from free-form model output.
//!
//! An [`ExtractorChain`] runs its [`Extractor`]s in order; the first one
//! that recovers a fragment wins. The standard chain tries a structured
//! JSON field, then a tag scan over the decoded strings of a JSON reply,
//! and finally a tag scan over the raw text.
//!
//! ```text
//! raw text ──► JsonFieldExtractor ──► JsonTagExtractor ──► TagExtractor ──► None
//!                    │                      │                   │
//!                    └──────────────── Extraction ◄─────────────┘
//! ```

use regex::Regex;
use serde_json::Value;

/// One strategy for recovering a fragment from raw model text.
pub trait Extractor: Send + Sync {
    /// Strategy name, reported in logs.
    fn name(&self) -> &'static str;

    /// Return the fragment, verbatim, or `None` if this strategy does not apply.
    fn extract(&self, raw: &str) -> Option<String>;
}

/// A recovered fragment and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub fragment: String,
    pub strategy: &'static str,
}

// ── JSON field ────────────────────────────────────────────────────────────────

/// Parses the text as JSON and reads one string field, from the top-level
/// object or from the first array element that carries it.
///
/// A surrounding markdown code fence (```` ``` ```` or ```` ```json ````) is
/// tolerated, since models often add one even when asked not to.
pub struct JsonFieldExtractor {
    field: String,
}

impl JsonFieldExtractor {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl Extractor for JsonFieldExtractor {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extract(&self, raw: &str) -> Option<String> {
        find_field(&parse_json(raw)?, &self.field).map(str::to_string)
    }
}

fn find_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty()),
        Value::Array(items) => items.iter().find_map(|v| find_field(v, field)),
        _ => None,
    }
}

/// Parse `raw` as JSON, tolerating one enclosing code fence.
fn parse_json(raw: &str) -> Option<Value> {
    serde_json::from_str(strip_code_fence(raw.trim())).ok()
}

/// Remove one enclosing ```` ```lang ... ``` ```` fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    }
}

// ── Tag pattern ───────────────────────────────────────────────────────────────

/// `<tag ...>...</tag>`, non-greedy, across lines. The tag name is escaped,
/// so any string is accepted.
fn tag_pattern(tag: &str) -> Result<Regex, regex::Error> {
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?s)<{tag}.*?</{tag}>"))
}

/// Finds the first tag region in the raw text.
pub struct TagExtractor {
    pattern: Regex,
}

impl TagExtractor {
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        Ok(Self { pattern: tag_pattern(tag)? })
    }
}

impl Extractor for TagExtractor {
    fn name(&self) -> &'static str {
        "tag"
    }

    fn extract(&self, raw: &str) -> Option<String> {
        self.pattern.find(raw).map(|m| m.as_str().to_string())
    }
}

/// Scans the decoded string values of a JSON reply for a tag region.
///
/// A reply that parses as JSON but lacks the expected field still carries
/// its markup escaped (`\"`, `\n`); matching the raw text would return the
/// escapes verbatim. Strings are visited depth-first.
pub struct JsonTagExtractor {
    pattern: Regex,
}

impl JsonTagExtractor {
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        Ok(Self { pattern: tag_pattern(tag)? })
    }

    fn scan(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => self.pattern.find(s).map(|m| m.as_str().to_string()),
            Value::Array(items) => items.iter().find_map(|v| self.scan(v)),
            Value::Object(map) => map.values().find_map(|v| self.scan(v)),
            _ => None,
        }
    }
}

impl Extractor for JsonTagExtractor {
    fn name(&self) -> &'static str {
        "json-tag"
    }

    fn extract(&self, raw: &str) -> Option<String> {
        self.scan(&parse_json(raw)?)
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

pub struct ExtractorChain {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorChain {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Structured field first, then tag scan over decoded JSON, then raw tag scan.
    pub fn standard(tag: &str, json_field: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            Box::new(JsonFieldExtractor::new(json_field)),
            Box::new(JsonTagExtractor::new(tag)?),
            Box::new(TagExtractor::new(tag)?),
        ]))
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn extract(&self, raw: &str) -> Option<Extraction> {
        self.extractors.iter().find_map(|e| {
            e.extract(raw).map(|fragment| Extraction { fragment, strategy: e.name() })
        })
    }
}

impl std::fmt::Debug for ExtractorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorChain")
            .field("strategies", &self.strategies())
            .finish()
    }
}
