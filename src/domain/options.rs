//! JSON option payloads accepted by the watermark and edit-text operations.

use crate::error::{ToolkitError, ToolkitResult};
use serde::Deserialize;

/// Direction the watermark text runs across the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkOrientation {
    #[default]
    Diagonal,
    Horizontal,
    Vertical,
}

impl WatermarkOrientation {
    /// Counter-clockwise rotation of the text baseline in degrees.
    pub fn angle(self) -> f32 {
        match self {
            Self::Diagonal => 45.0,
            Self::Horizontal => 0.0,
            Self::Vertical => 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl WatermarkSize {
    /// Font size in points.
    pub fn font_size(self) -> f32 {
        match self {
            Self::Small => 25.0,
            Self::Medium => 50.0,
            Self::Large => 75.0,
        }
    }
}

/// Watermark configuration.
///
/// Unknown orientation or size names fall back to the defaults rather than
/// failing, matching how the desktop front end sends free-form values.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub text: String,
    pub orientation: WatermarkOrientation,
    pub size: WatermarkSize,
    /// Fill and stroke opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Grey level of the text fill.
    pub gray: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: "WATERMARK".to_string(),
            orientation: WatermarkOrientation::default(),
            size: WatermarkSize::default(),
            opacity: 0.5,
            gray: 0.8,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawWatermarkOptions {
    text: Option<String>,
    orientation: Option<String>,
    size: Option<String>,
}

impl WatermarkOptions {
    pub fn from_json(json: &str) -> ToolkitResult<Self> {
        let raw: RawWatermarkOptions = serde_json::from_str(json)
            .map_err(|e| ToolkitError::invalid_format(json, e.to_string()))?;
        let defaults = Self::default();

        let text = match raw.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => defaults.text.clone(),
        };
        let orientation = raw
            .orientation
            .and_then(|o| serde_json::from_value(serde_json::Value::String(o)).ok())
            .unwrap_or(defaults.orientation);
        let size = raw
            .size
            .and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok())
            .unwrap_or(defaults.size);

        Ok(Self {
            text,
            orientation,
            size,
            ..defaults
        })
    }
}

/// One text substitution for `edit-text replace`.
///
/// Keys are camelCase; the snake_case spellings `old_text` and `new_text`
/// are accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextReplacement {
    /// One-based page number.
    pub page: u64,
    #[serde(default, alias = "old_text")]
    pub old_text: String,
    #[serde(alias = "new_text")]
    pub new_text: String,
    #[serde(default = "default_replacement_size")]
    pub size: f32,
    /// Area to clear instead of searching for `oldText`, as
    /// `[x0, y0, x1, y1]` with the origin at the top-left of the page.
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub color: TextColor,
}

fn default_replacement_size() -> f32 {
    12.0
}

/// Fill colour of replacement text.
///
/// Either `[r, g, b]` components in `0..=1` or a packed `0xRRGGBB` integer,
/// the form `edit-text extract` reports.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextColor {
    Components([f32; 3]),
    Packed(u32),
}

impl Default for TextColor {
    fn default() -> Self {
        Self::Packed(0)
    }
}

impl TextColor {
    /// RGB components clamped to `0..=1`.
    pub fn rgb(&self) -> [f32; 3] {
        match *self {
            Self::Components(rgb) => rgb.map(|c| c.clamp(0.0, 1.0)),
            Self::Packed(packed) => [16, 8, 0].map(|shift| ((packed >> shift) & 0xFF) as f32 / 255.0),
        }
    }
}

impl TextReplacement {
    pub fn list_from_json(json: &str) -> ToolkitResult<Vec<Self>> {
        let list: Vec<Self> = serde_json::from_str(json)
            .map_err(|e| ToolkitError::invalid_format(json, e.to_string()))?;

        for replacement in &list {
            let context = format!("page {}", replacement.page);
            match replacement.bbox {
                Some([x0, y0, x1, y1]) if !(x0 < x1 && y0 < y1) => {
                    return Err(ToolkitError::invalid_format(
                        &context,
                        "bbox must be [x0, y0, x1, y1] with x0 < x1 and y0 < y1",
                    ))
                }
                None if replacement.old_text.is_empty() => {
                    return Err(ToolkitError::invalid_format(
                        &context,
                        "oldText must not be empty",
                    ))
                }
                _ => {}
            }
            if replacement.size.is_nan() || replacement.size <= 0.0 {
                return Err(ToolkitError::invalid_format(&context, "size must be positive"));
            }
        }
        Ok(list)
    }
}
