/// Remote generation service abstraction
///
/// The studio never talks to the network directly; it hands validated
/// requests to an `ImageCapabilities` implementation and folds the response
/// back into an [`Image`].
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::description::StructuredDescription;
use crate::frame::Image;
use crate::tools::EditOperation;
use crate::StudioError;

/// Raw service response. Only `image_url` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub structured_prompt: Option<Value>,
}

impl ImageResponse {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Build the resulting image. When the response carries no usable
    /// structured description, `carried` is attached instead so structured
    /// remix stays available on the result.
    pub fn into_image(
        self,
        carried: Option<&StructuredDescription>,
    ) -> std::result::Result<Image, StudioError> {
        let url = self
            .image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| StudioError::MalformedResponse("response has no image_url".into()))?;

        let returned = match self.structured_prompt {
            None | Some(Value::Null) => None,
            Some(value) => match StructuredDescription::from_value(value) {
                Ok(description) => Some(description),
                Err(err) => {
                    warn!(error = %err, "ignoring unreadable structured_prompt in response");
                    None
                }
            },
        };

        Ok(Image {
            url,
            seed: self.seed,
            structured_description: returned.or_else(|| carried.cloned()),
        })
    }
}

/// The generation service as seen by the studio.
#[async_trait]
pub trait ImageCapabilities: Send + Sync {
    /// Service name for logs
    fn name(&self) -> &str;

    /// Check if the service is reachable/configured
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Apply one edit tool to `image`
    async fn edit(&self, image: &Image, operation: &EditOperation) -> Result<ImageResponse>;

    /// Structured description to edit for structured remix. The default
    /// uses the description stored on the image as-is.
    async fn analyze_structure(
        &self,
        description: &StructuredDescription,
    ) -> Result<StructuredDescription> {
        Ok(description.clone())
    }

    /// Generate a new image from `instruction`, using `reference` (its seed
    /// and structure) as the base
    async fn regenerate(&self, instruction: &str, reference: &Image) -> Result<ImageResponse>;
}
