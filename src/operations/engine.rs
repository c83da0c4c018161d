//! Rendering and rewriting engine trait and supporting types.
//!
//! Operations that need a full PDF renderer or writer (rasterising,
//! optimised or encrypted saves, text redaction) go through this seam so the
//! runner can be driven by a different backend.

use crate::config::EncryptionStrength;
use crate::error::ToolkitResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One page to rasterise into a PNG file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    /// Zero-based page index.
    pub page: usize,
    pub dpi: u32,
    pub output: PathBuf,
}

/// Text to find and physically remove from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTarget {
    /// Zero-based page index.
    pub page: usize,
    pub text: String,
    /// Clear exactly this area instead of searching for `text`.
    ///
    /// `[x0, y0, x1, y1]` in page space, origin top-left, as reported in
    /// [`TextSpan::bbox`].
    pub bbox: Option<[f32; 4]>,
}

/// Where a removed occurrence used to be.
///
/// Coordinates are in PDF user space (origin bottom-left, before any
/// `/Rotate`), so they can be drawn into the page's content stream as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextHit {
    /// Position of the matching entry in the target list.
    pub target: usize,
    pub page: usize,
    /// Lower-left corner of the removed text, as it reads.
    pub x: f32,
    pub y: f32,
    /// Extent along the baseline.
    pub width: f32,
    pub height: f32,
    /// Unit vector along the baseline; `(1, 0)` for upright text.
    pub direction: (f32, f32),
}

impl TextHit {
    /// Unit vector from the baseline towards the top of the glyphs.
    pub fn up(&self) -> (f32, f32) {
        (-self.direction.1, self.direction.0)
    }

    /// The four corners, counter-clockwise from the lower-left.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (dx, dy) = self.direction;
        let (ux, uy) = self.up();
        let (w, h) = (self.width, self.height);
        [
            (self.x, self.y),
            (self.x + dx * w, self.y + dy * w),
            (self.x + dx * w + ux * h, self.y + dy * w + uy * h),
            (self.x + ux * h, self.y + uy * h),
        ]
    }
}

/// A run of characters sharing font, size and colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    /// One-based page number.
    pub page: usize,
    pub text: String,
    /// `[x0, y0, x1, y1]`, origin top-left of the displayed page.
    pub bbox: [f32; 4],
    pub font: String,
    pub size: f32,
    /// Packed `0xRRGGBB`.
    pub color: u32,
}

/// Backend capable of rendering and rewriting whole documents.
pub trait DocumentEngine: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, input: &Path) -> ToolkitResult<usize>;

    /// Renders each job's page to a PNG file.
    fn render_pages(&self, input: &Path, jobs: &[RenderJob]) -> ToolkitResult<()>;

    /// Re-saves the document with garbage collection and stream compression.
    fn save_optimized(&self, input: &Path, output: &Path) -> ToolkitResult<()>;

    /// Saves the document with `password` as both owner and user password.
    fn save_encrypted(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        strength: EncryptionStrength,
    ) -> ToolkitResult<()>;

    /// Physically removes every occurrence of each target and saves to `output`.
    ///
    /// A target with a `bbox` removes everything inside that area once.
    fn redact_text(
        &self,
        input: &Path,
        output: &Path,
        targets: &[TextTarget],
    ) -> ToolkitResult<Vec<TextHit>>;

    /// Extracts the plain text of the document.
    fn extract_text(&self, input: &Path) -> ToolkitResult<String>;

    /// Lists every text span with its position and style, page by page.
    fn text_spans(&self, input: &Path) -> ToolkitResult<Vec<TextSpan>>;

    /// Returns a human-readable name for this engine.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(direction: (f32, f32)) -> TextHit {
        TextHit {
            target: 0,
            page: 0,
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 5.0,
            direction,
        }
    }

    #[test]
    fn test_upright_hit_corners() {
        assert_eq!(
            hit((1.0, 0.0)).corners(),
            [(10.0, 20.0), (40.0, 20.0), (40.0, 25.0), (10.0, 25.0)]
        );
    }

    #[test]
    fn test_quarter_turn_hit_corners() {
        let hit = hit((0.0, 1.0));
        assert_eq!(hit.up(), (-1.0, 0.0));
        assert_eq!(
            hit.corners(),
            [(10.0, 20.0), (10.0, 50.0), (5.0, 50.0), (5.0, 20.0)]
        );
    }
}
