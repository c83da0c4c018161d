//! Runner configuration shared by every operation of a run.

use crate::domain::OutOfRangePolicy;
use crate::error::ToolkitError;
use std::str::FromStr;

/// Cipher applied by `protect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptionStrength {
    #[default]
    Aes256,
    Aes128,
    Rc4_128,
}

impl FromStr for EncryptionStrength {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes256" | "aes-256" => Ok(Self::Aes256),
            "aes128" | "aes-128" => Ok(Self::Aes128),
            "rc4-128" | "rc4" => Ok(Self::Rc4_128),
            other => Err(ToolkitError::invalid_format(
                other,
                "expected 'aes256', 'aes128' or 'rc4-128'",
            )),
        }
    }
}

/// Settings passed explicitly into [`OperationRunner`](crate::OperationRunner).
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub out_of_range: OutOfRangePolicy,
    /// Resolution of `pdf-to-image` output.
    pub raster_dpi: u32,
    /// Resolution of a single-page preview.
    pub preview_dpi: u32,
    /// Resolution of all-page preview thumbnails.
    pub thumbnail_dpi: u32,
    pub encryption: EncryptionStrength,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            out_of_range: OutOfRangePolicy::Reject,
            raster_dpi: 300,
            preview_dpi: 150,
            thumbnail_dpi: 96,
            encryption: EncryptionStrength::Aes256,
        }
    }
}

impl RunnerConfig {
    pub fn with_out_of_range(mut self, policy: OutOfRangePolicy) -> Self {
        self.out_of_range = policy;
        self
    }

    pub fn with_raster_dpi(mut self, dpi: u32) -> Self {
        self.raster_dpi = dpi;
        self
    }

    pub fn with_encryption(mut self, strength: EncryptionStrength) -> Self {
        self.encryption = strength;
        self
    }
}
