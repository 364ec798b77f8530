/// HTTP client for the storyboard image generation service
///
/// Implements the studio's `ImageCapabilities` against a JSON HTTP API:
/// - `POST /generate` for text-to-image and structured regeneration
/// - one endpoint per edit tool (`/erase`, `/gen_fill`, ...)
use thiserror::Error;

pub mod config;
pub mod http;
pub mod request;

pub use config::BackendConfig;
pub use http::HttpBackend;
pub use request::{EditRequest, GenerateRequest, GenerateResponse};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid api_url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("no image URL returned from backend")]
    MissingImage,
}

pub type Result<T> = std::result::Result<T, BackendError>;
