use serde::{Deserialize, Serialize};

use crate::description::StructuredDescription;

/// A generated storyboard frame as handed around by the studio.
///
/// Field names match the generation service's JSON so records can be passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "image_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(
        default,
        rename = "structured_prompt",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_description: Option<StructuredDescription>,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            seed: None,
            structured_description: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_description(mut self, description: StructuredDescription) -> Self {
        self.structured_description = Some(description);
        self
    }

    pub fn has_structured_description(&self) -> bool {
        self.structured_description.is_some()
    }
}
