/// Backend configuration
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Service root; endpoints are resolved against it
    pub api_url: String,

    /// Sent as a bearer token when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl BackendConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            timeout_secs: Some(120),
        }
    }

    /// With API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// `api_url` joined with `path`, tolerating slashes on either side.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            BackendConfig::new("http://localhost:8000/").endpoint("/generate"),
            "http://localhost:8000/generate"
        );
        assert_eq!(
            BackendConfig::default().endpoint("gen_fill"),
            "http://localhost:8000/gen_fill"
        );
    }

    #[test]
    fn test_api_key_is_not_written_when_absent() {
        let json = serde_json::to_string(&BackendConfig::default()).unwrap();
        assert!(!json.contains("api_key"));
        let config: BackendConfig = serde_json::from_str(r#"{"api_url": "http://x"}"#).unwrap();
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("backend-{}.json", uuid::Uuid::new_v4()));
        let config = BackendConfig::new("https://gen.example")
            .with_api_key("secret")
            .with_timeout(30);
        config.save(&path).unwrap();
        let loaded = BackendConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
