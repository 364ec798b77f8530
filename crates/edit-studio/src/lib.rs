/// Image Edit Studio core
///
/// Masked and structured regeneration of storyboard frames: pointer mapping,
/// mask rasterization, the tool state machine, invocation dispatch against a
/// remote generation service, structured prompt diffing and session versioning.
use thiserror::Error;

pub mod capability;
pub mod config;
pub mod coords;
pub mod data_url;
pub mod description;
pub mod dispatch;
pub mod frame;
pub mod mask;
pub mod prompt_diff;
pub mod studio;
pub mod tools;
pub mod version;

pub use capability::{ImageCapabilities, ImageResponse};
pub use config::StudioConfig;
pub use coords::{CoordinateMapper, Point, RenderedBox};
pub use description::{FieldValue, NormalizedDescription, StructuredDescription};
pub use dispatch::{EditDispatcher, Invocation, InvocationKind, InvocationOutcome, InvocationResult};
pub use frame::Image;
pub use mask::MaskSurface;
pub use prompt_diff::{DescriptionEditor, FieldChange};
pub use studio::EditStudio;
pub use tools::{
    AspectRatio, BlurIntensity, EditOperation, MaskImage, ToolInputs, ToolKind, ToolStateMachine,
};
pub use version::{EditSession, SavedEdit, SessionState};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("draw a mask before applying {0}")]
    EmptyMask(ToolKind),

    #[error("{0} requires an instruction")]
    MissingInstruction(ToolKind),

    #[error("image has no structured description; structured remix is unavailable")]
    MissingStructuredDescription,

    #[error("nothing to regenerate: no field changed and no additional instructions")]
    NothingToRegenerate,

    #[error("blur intensity must be between {min} and {max}, got {value}")]
    InvalidIntensity { value: u8, min: u8, max: u8 },

    #[error("{0} cannot be applied")]
    NotApplicable(ToolKind),

    #[error("an edit is already in progress")]
    Busy,

    #[error("save or discard the current edit before switching tools")]
    UnsavedChanges,

    #[error("accept or discard the pending variation first")]
    VariationPending,

    #[error("no variation is pending")]
    NoVariationPending,

    #[error("invocation {0} is not the one in flight")]
    StaleInvocation(uuid::Uuid),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("field {0} is not a list")]
    NotAList(String),

    #[error("field {0} is not a text field")]
    NotText(String),

    #[error("index {index} out of range for field {field}")]
    IndexOutOfRange { field: String, index: usize },

    #[error("structured description could not be analyzed: {0}")]
    Analysis(String),

    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),

    #[error("mask encoding failed: {0}")]
    Encode(String),

    #[error("service error: {0}")]
    Capability(String),

    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}

impl StudioError {
    /// Rejected locally before any request was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyMask(_)
                | Self::MissingInstruction(_)
                | Self::MissingStructuredDescription
                | Self::NothingToRegenerate
                | Self::InvalidIntensity { .. }
                | Self::NotApplicable(_)
        )
    }

    /// Failure reported by (or about) the remote service.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Capability(_) | Self::MalformedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
