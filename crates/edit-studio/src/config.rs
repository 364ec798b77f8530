/// Studio defaults: brush sizing, blur strength and expand target
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::tools::{AspectRatio, BlurIntensity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Brush diameter in native image pixels
    pub default_brush_diameter: f32,

    pub min_brush_diameter: f32,

    pub max_brush_diameter: f32,

    pub default_blur_intensity: BlurIntensity,

    pub default_aspect_ratio: AspectRatio,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            default_brush_diameter: 40.0,
            min_brush_diameter: 5.0,
            max_brush_diameter: 200.0,
            default_blur_intensity: BlurIntensity::default(),
            default_aspect_ratio: AspectRatio::default(),
        }
    }
}

impl StudioConfig {
    pub fn with_brush_range(mut self, min: f32, max: f32) -> Self {
        self.min_brush_diameter = min;
        self.max_brush_diameter = max;
        self
    }

    pub fn with_default_brush(mut self, diameter: f32) -> Self {
        self.default_brush_diameter = diameter;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.default_aspect_ratio = ratio;
        self
    }

    pub fn clamp_brush(&self, diameter: f32) -> f32 {
        let (lo, hi) = self.brush_bounds();
        if diameter.is_finite() {
            diameter.clamp(lo, hi)
        } else {
            lo
        }
    }

    /// Bounds as configured, repaired if inverted or below one pixel.
    fn brush_bounds(&self) -> (f32, f32) {
        let lo = self.min_brush_diameter.max(1.0);
        let hi = self.max_brush_diameter.max(lo);
        (lo, hi)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_brush_diameter.is_nan() || self.min_brush_diameter < 1.0 {
            anyhow::bail!("min_brush_diameter must be at least 1 pixel");
        }
        if self.max_brush_diameter < self.min_brush_diameter {
            anyhow::bail!(
                "max_brush_diameter ({}) is below min_brush_diameter ({})",
                self.max_brush_diameter,
                self.min_brush_diameter
            );
        }
        Ok(())
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
