/// Wire types for the generation service
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edit_studio::data_url::strip_data_url_prefix;
use edit_studio::{EditOperation, Image, ImageResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BackendError, Result};

/// Body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,

    #[serde(rename = "referenceImages", default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_prompt: Option<Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            seed: None,
            structured_prompt: None,
        }
    }

    /// Regenerate `reference` under `instruction`, keeping its seed and
    /// structure so unchanged fields stay put.
    pub fn regeneration(instruction: &str, reference: &Image) -> Self {
        Self {
            prompt: instruction.to_string(),
            reference_images: vec![image_payload(&reference.url).to_string()],
            seed: reference.seed,
            structured_prompt: reference
                .structured_description
                .as_ref()
                .map(|description| description.to_value()),
        }
    }
}

/// Body shared by the edit endpoints. Only the fields a tool needs are sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl EditRequest {
    pub fn new(image: &Image, operation: &EditOperation) -> Self {
        let mut request = Self {
            image: image_payload(&image.url).to_string(),
            mask: None,
            prompt: None,
            intensity: None,
            aspect_ratio: None,
            seed: image.seed,
        };
        match operation {
            EditOperation::Erase { mask } => {
                request.mask = Some(STANDARD.encode(&mask.0));
            }
            EditOperation::GenerativeFill { mask, prompt } => {
                request.mask = Some(STANDARD.encode(&mask.0));
                request.prompt = Some(prompt.clone());
            }
            EditOperation::RemoveBackground | EditOperation::RemoveForeground => {}
            EditOperation::BlurBackground { intensity } => {
                request.intensity = Some(intensity.get());
            }
            EditOperation::ReplaceBackground { prompt } => {
                request.prompt = Some(prompt.clone());
            }
            EditOperation::Expand {
                aspect_ratio,
                prompt,
            } => {
                request.aspect_ratio = Some(aspect_ratio.as_str().to_string());
                request.prompt = prompt.clone();
            }
        }
        request
    }
}

/// Endpoint path for an edit tool.
pub fn edit_endpoint(operation: &EditOperation) -> &'static str {
    match operation {
        EditOperation::Erase { .. } => "erase",
        EditOperation::GenerativeFill { .. } => "gen_fill",
        EditOperation::RemoveBackground => "remove_background",
        EditOperation::RemoveForeground => "remove_foreground",
        EditOperation::BlurBackground { .. } => "blur_background",
        EditOperation::ReplaceBackground { .. } => "replace_background",
        EditOperation::Expand { .. } => "expand",
    }
}

/// Inline images travel as bare base64; remote images as their URL.
fn image_payload(url: &str) -> &str {
    strip_data_url_prefix(url)
}

/// Response body of every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub structured_prompt: Option<Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn into_image_response(self, status: u16) -> Result<ImageResponse> {
        match self.image_url.filter(|url| !url.trim().is_empty()) {
            Some(url) => Ok(ImageResponse {
                image_url: Some(url),
                seed: self.seed,
                structured_prompt: self.structured_prompt,
            }),
            None => match self.error {
                Some(message) => Err(BackendError::Api { status, message }),
                None => Err(BackendError::MissingImage),
            },
        }
    }
}
