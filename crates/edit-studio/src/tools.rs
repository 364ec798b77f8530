/// Edit tools, their parameters and the switching rules between them
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StudioConfig;
use crate::mask::MaskSurface;
use crate::{Result, StudioError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Look only, no edit pending
    #[default]
    View,
    Erase,
    GenerativeFill,
    RemoveBackground,
    ReplaceBackground,
    BlurBackground,
    RemoveForeground,
    Expand,
    /// Field-level regeneration from the structured description
    StructuredRemix,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::View => "View",
            Self::Erase => "Erase",
            Self::GenerativeFill => "Generative Fill",
            Self::RemoveBackground => "Remove Background",
            Self::ReplaceBackground => "Replace Background",
            Self::BlurBackground => "Blur Background",
            Self::RemoveForeground => "Remove Foreground",
            Self::Expand => "Expand",
            Self::StructuredRemix => "Structured Remix",
        }
    }

    /// Kebab-case identifier, as used on the command line and in JSON.
    pub fn id(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Erase => "erase",
            Self::GenerativeFill => "generative-fill",
            Self::RemoveBackground => "remove-background",
            Self::ReplaceBackground => "replace-background",
            Self::BlurBackground => "blur-background",
            Self::RemoveForeground => "remove-foreground",
            Self::Expand => "expand",
            Self::StructuredRemix => "structured-remix",
        }
    }

    pub fn requires_mask(&self) -> bool {
        matches!(self, Self::Erase | Self::GenerativeFill)
    }

    /// Tools applied through a single edit request.
    pub fn is_direct_edit(&self) -> bool {
        !matches!(self, Self::View | Self::StructuredRemix)
    }

    pub fn all() -> [Self; 9] {
        [
            Self::View,
            Self::Erase,
            Self::GenerativeFill,
            Self::RemoveBackground,
            Self::ReplaceBackground,
            Self::BlurBackground,
            Self::RemoveForeground,
            Self::Expand,
            Self::StructuredRemix,
        ]
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::all()
            .into_iter()
            .find(|tool| tool.id() == wanted)
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

/// Background blur strength, 1 (subtle) to 5 (strong).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BlurIntensity(u8);

impl BlurIntensity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(StudioError::InvalidIntensity {
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for BlurIntensity {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for BlurIntensity {
    type Error = StudioError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BlurIntensity> for u8 {
    fn from(value: BlurIntensity) -> Self {
        value.0
    }
}

/// Target canvas shape for expand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[serde(rename = "5:4")]
    Landscape5x4,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "21:9")]
    Ultrawide21x9,
}

impl AspectRatio {
    pub fn all() -> [Self; 10] {
        [
            Self::Square,
            Self::Portrait2x3,
            Self::Landscape3x2,
            Self::Portrait3x4,
            Self::Landscape4x3,
            Self::Portrait4x5,
            Self::Landscape5x4,
            Self::Portrait9x16,
            Self::Landscape16x9,
            Self::Ultrawide21x9,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait2x3 => "2:3",
            Self::Landscape3x2 => "3:2",
            Self::Portrait3x4 => "3:4",
            Self::Landscape4x3 => "4:3",
            Self::Portrait4x5 => "4:5",
            Self::Landscape5x4 => "5:4",
            Self::Portrait9x16 => "9:16",
            Self::Landscape16x9 => "16:9",
            Self::Ultrawide21x9 => "21:9",
        }
    }

    pub fn ratio(&self) -> f32 {
        let (w, h) = self
            .as_str()
            .split_once(':')
            .and_then(|(w, h)| Some((w.parse::<f32>().ok()?, h.parse::<f32>().ok()?)))
            .unwrap_or((1.0, 1.0));
        w / h
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Self::all()
            .into_iter()
            .find(|ratio| ratio.as_str() == wanted)
            .ok_or_else(|| format!("unsupported aspect ratio '{s}'"))
    }
}

/// PNG-encoded mask attached to a masked edit.
#[derive(Clone, PartialEq, Eq)]
pub struct MaskImage(pub Vec<u8>);

impl fmt::Debug for MaskImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskImage({} bytes)", self.0.len())
    }
}

impl MaskImage {
    pub fn from_surface(mask: &MaskSurface) -> Result<Self> {
        Ok(Self(mask.export_png()?))
    }

    pub fn to_data_url(&self) -> String {
        crate::data_url::DataUrl::png(self.0.clone()).to_url()
    }
}

/// A validated edit, ready to send. Each variant carries exactly the inputs
/// its service call needs.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOperation {
    Erase { mask: MaskImage },
    GenerativeFill { mask: MaskImage, prompt: String },
    RemoveBackground,
    RemoveForeground,
    BlurBackground { intensity: BlurIntensity },
    ReplaceBackground { prompt: String },
    Expand {
        aspect_ratio: AspectRatio,
        prompt: Option<String>,
    },
}

impl EditOperation {
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::Erase { .. } => ToolKind::Erase,
            Self::GenerativeFill { .. } => ToolKind::GenerativeFill,
            Self::RemoveBackground => ToolKind::RemoveBackground,
            Self::RemoveForeground => ToolKind::RemoveForeground,
            Self::BlurBackground { .. } => ToolKind::BlurBackground,
            Self::ReplaceBackground { .. } => ToolKind::ReplaceBackground,
            Self::Expand { .. } => ToolKind::Expand,
        }
    }
}

/// Per-tool user inputs. Survive tool switches; prompts are cleared after a
/// successful apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInputs {
    pub brush_diameter: f32,
    pub fill_prompt: String,
    pub replace_prompt: String,
    pub expand_prompt: String,
    pub expand_aspect_ratio: AspectRatio,
    pub blur_intensity: BlurIntensity,
}

impl ToolInputs {
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            brush_diameter: config.clamp_brush(config.default_brush_diameter),
            fill_prompt: String::new(),
            replace_prompt: String::new(),
            expand_prompt: String::new(),
            expand_aspect_ratio: config.default_aspect_ratio,
            blur_intensity: config.default_blur_intensity,
        }
    }

    fn clear_prompts(&mut self) {
        self.fill_prompt.clear();
        self.replace_prompt.clear();
        self.expand_prompt.clear();
    }
}

fn required_text(text: &str, tool: ToolKind) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(StudioError::MissingInstruction(tool))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Which tool is active and what the user has typed into each.
#[derive(Clone, Debug)]
pub struct ToolStateMachine {
    active: ToolKind,
    /// Tool that was active when structured remix was entered
    remix_entered_from: ToolKind,
    inputs: ToolInputs,
    config: StudioConfig,
}

impl ToolStateMachine {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            active: ToolKind::View,
            remix_entered_from: ToolKind::View,
            inputs: ToolInputs::from_config(&config),
            config,
        }
    }

    pub fn active(&self) -> ToolKind {
        self.active
    }

    pub fn inputs(&self) -> &ToolInputs {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut ToolInputs {
        &mut self.inputs
    }

    /// Whether `tool` may be selected right now. Structured remix can always
    /// be entered, and left for view or for the tool it was entered from;
    /// any other switch needs a clean session.
    pub fn can_select(&self, tool: ToolKind, has_unsaved_changes: bool, processing: bool) -> Result<()> {
        if processing {
            return Err(StudioError::Busy);
        }
        if tool == self.active || tool == ToolKind::StructuredRemix {
            return Ok(());
        }
        if self.active == ToolKind::StructuredRemix
            && (tool == ToolKind::View || tool == self.remix_entered_from)
        {
            return Ok(());
        }
        if has_unsaved_changes {
            return Err(StudioError::UnsavedChanges);
        }
        Ok(())
    }

    pub fn select(&mut self, tool: ToolKind, has_unsaved_changes: bool, processing: bool) -> Result<()> {
        self.can_select(tool, has_unsaved_changes, processing)?;
        if tool != self.active {
            debug!(from = %self.active, to = %tool, "tool switched");
            if tool == ToolKind::StructuredRemix {
                self.remix_entered_from = self.active;
            }
            self.active = tool;
        }
        Ok(())
    }

    /// Brush changes go through the studio so the mask stamps the same size.
    pub(crate) fn set_brush_diameter(&mut self, diameter: f32) -> f32 {
        self.inputs.brush_diameter = self.config.clamp_brush(diameter);
        self.inputs.brush_diameter
    }

    pub fn set_blur_intensity(&mut self, value: u8) -> Result<()> {
        self.inputs.blur_intensity = BlurIntensity::new(value)?;
        Ok(())
    }

    /// Validate the active tool's inputs and produce the request payload.
    pub fn build_operation(&self, mask: &MaskSurface) -> Result<EditOperation> {
        let tool = self.active;
        match tool {
            ToolKind::View | ToolKind::StructuredRemix => Err(StudioError::NotApplicable(tool)),
            ToolKind::Erase => {
                if !mask.has_paint() {
                    return Err(StudioError::EmptyMask(tool));
                }
                Ok(EditOperation::Erase {
                    mask: MaskImage::from_surface(mask)?,
                })
            }
            ToolKind::GenerativeFill => {
                if !mask.has_paint() {
                    return Err(StudioError::EmptyMask(tool));
                }
                let prompt = required_text(&self.inputs.fill_prompt, tool)?;
                Ok(EditOperation::GenerativeFill {
                    mask: MaskImage::from_surface(mask)?,
                    prompt,
                })
            }
            ToolKind::RemoveBackground => Ok(EditOperation::RemoveBackground),
            ToolKind::RemoveForeground => Ok(EditOperation::RemoveForeground),
            ToolKind::BlurBackground => Ok(EditOperation::BlurBackground {
                intensity: self.inputs.blur_intensity,
            }),
            ToolKind::ReplaceBackground => Ok(EditOperation::ReplaceBackground {
                prompt: required_text(&self.inputs.replace_prompt, tool)?,
            }),
            ToolKind::Expand => {
                let prompt = self.inputs.expand_prompt.trim();
                Ok(EditOperation::Expand {
                    aspect_ratio: self.inputs.expand_aspect_ratio,
                    prompt: (!prompt.is_empty()).then(|| prompt.to_string()),
                })
            }
        }
    }

    /// Back to view after a successful apply. Prompts are cleared; brush
    /// size, blur intensity and aspect ratio are kept.
    pub fn finish_apply(&mut self) {
        self.inputs.clear_prompts();
        self.active = ToolKind::View;
        self.remix_entered_from = ToolKind::View;
    }

    /// Forget everything typed so far; used when the session is discarded.
    pub fn reset(&mut self) {
        self.inputs = ToolInputs::from_config(&self.config);
        self.active = ToolKind::View;
        self.remix_entered_from = ToolKind::View;
    }
}
