//! `data:` URL encoding for extracted fragments.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub const SVG_MIME: &str = "image/svg+xml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a data URL")]
    MissingScheme,
    #[error("data URL is not base64-encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// A `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl(String);

impl DataUrl {
    pub fn encode(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn svg(fragment: &str) -> Self {
        Self::encode(SVG_MIME, fragment.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split a base64 data URL into its media type and decoded bytes.
    pub fn decode(url: &str) -> Result<(String, Vec<u8>), DataUrlError> {
        let rest = url.strip_prefix("data:").ok_or(DataUrlError::MissingScheme)?;
        let (meta, payload) = rest.split_once(',').ok_or(DataUrlError::MissingScheme)?;
        let mime = meta.strip_suffix(";base64").ok_or(DataUrlError::NotBase64)?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| DataUrlError::Payload(e.to_string()))?;
        Ok((mime.to_string(), bytes))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
