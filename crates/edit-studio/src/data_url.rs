/// `data:` URL helpers for inline images exchanged with the generation service
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{Result, StudioError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    /// Parse `data:<mime>;base64,<payload>`. Only base64 payloads are accepted.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::InvalidDataUrl("missing data: scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::InvalidDataUrl("missing ',' separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| StudioError::InvalidDataUrl("only base64 payloads are supported".into()))?;
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| StudioError::InvalidDataUrl(e.to_string()))?;
        let mime_type = if mime_type.is_empty() {
            "text/plain".to_string()
        } else {
            mime_type.to_string()
        };
        Ok(Self { mime_type, data })
    }

    pub fn to_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

/// Bare base64 payload of a data URL; other strings are returned as-is.
pub fn strip_data_url_prefix(url: &str) -> &str {
    if is_data_url(url) {
        url.split_once(',').map(|(_, payload)| payload).unwrap_or(url)
    } else {
        url
    }
}
