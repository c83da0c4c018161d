//! Document engine backed by MuPDF.
//!
//! Rasterises pages, performs optimised and encrypted saves, and physically
//! removes text through MuPDF's redaction API so replaced text cannot be
//! recovered from the output.

use super::document_ops::check_password;
use super::engine::{DocumentEngine, RenderJob, TextHit, TextSpan, TextTarget};
use crate::config::EncryptionStrength;
use crate::error::{ToolkitError, ToolkitResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use mupdf::pdf::{Encryption, PdfAnnotationType, PdfDocument, PdfPage, PdfWriteOptions};
use mupdf::{
    Colorspace, Document, ImageFormat, Matrix, Point, Quad, Rect as MuRect, TextLine,
    TextPageOptions,
};

/// Engine that delegates rendering and rewriting to MuPDF.
#[derive(Debug, Clone)]
pub struct MupdfEngine {
    /// Maximum search hits per text target and page
    max_hits: u32,
}

impl Default for MupdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MupdfEngine {
    pub fn new() -> Self {
        Self { max_hits: 100 }
    }

    /// Sets the maximum number of search hits per text target.
    pub fn with_max_hits(mut self, max_hits: u32) -> Self {
        self.max_hits = max_hits;
        self
    }

    fn open_pdf(input: &Path) -> ToolkitResult<PdfDocument> {
        PdfDocument::open(path_str(input, "input")?)
            .map_err(mupdf_error("Failed to open PDF with MuPDF"))
    }

    /// Removes every target on one page and returns the hits found.
    fn redact_page(
        &self,
        pdf_doc: &PdfDocument,
        page_idx: usize,
        targets: &[(usize, &TextTarget)],
    ) -> ToolkitResult<Vec<TextHit>> {
        let page = pdf_doc
            .load_page(page_idx as i32)
            .map_err(mupdf_error(format!("Failed to load page {}", page_idx + 1)))?;

        let mut pdf_page = match PdfPage::try_from(page.clone()) {
            Ok(p) => p,
            Err(_) => {
                return Err(ToolkitError::library(
                    "MuPDF",
                    format!("Page {} is not a PDF page", page_idx + 1),
                ))
            }
        };
        // Hits are found in display space; the overlay is drawn in user space.
        let ctm = pdf_page
            .ctm()
            .map_err(mupdf_error(format!("Failed to get transform for page {}", page_idx + 1)))?;
        let to_user = invert(&ctm).ok_or_else(|| {
            ToolkitError::library("MuPDF", format!("Page {} has a degenerate transform", page_idx + 1))
        })?;

        let mut hits = Vec::new();
        for &(target_idx, target) in targets {
            let quads: Vec<Quad> = match target.bbox {
                Some([x0, y0, x1, y1]) => vec![rect_quad(&MuRect { x0, y0, x1, y1 })],
                None => page
                    .search(&target.text, self.max_hits)
                    .map_err(mupdf_error(format!("Search failed for text: {}", target.text)))?
                    .into_iter()
                    .collect(),
            };

            for quad in quads {
                let annot = pdf_page
                    .create_annotation(PdfAnnotationType::Redact)
                    .map_err(mupdf_error("Failed to create redaction annotation"))?;

                unsafe {
                    ffi::set_annotation_rect(&annot, bounding_rect(&quad));
                }
                hits.push(user_space_hit(target_idx, page_idx, &quad, &to_user));
            }
        }

        if !hits.is_empty() {
            pdf_page
                .redact()
                .map_err(mupdf_error(format!("Failed to apply redactions on page {}", page_idx + 1)))?;
        }
        debug!(page = page_idx, hits = hits.len(), "redacted page");
        Ok(hits)
    }
}

impl DocumentEngine for MupdfEngine {
    fn page_count(&self, input: &Path) -> ToolkitResult<usize> {
        let doc = Document::open(path_str(input, "input")?)
            .map_err(mupdf_error("Failed to open document with MuPDF"))?;
        let count = doc
            .page_count()
            .map_err(mupdf_error("Failed to get page count"))?;
        Ok(count.max(0) as usize)
    }

    fn render_pages(&self, input: &Path, jobs: &[RenderJob]) -> ToolkitResult<()> {
        let doc = Document::open(path_str(input, "input")?)
            .map_err(mupdf_error("Failed to open document with MuPDF"))?;

        for job in jobs {
            let page = doc
                .load_page(job.page as i32)
                .map_err(mupdf_error(format!("Failed to load page {}", job.page + 1)))?;

            let scale = job.dpi as f32 / 72.0;
            let pixmap = page
                .to_pixmap(
                    &Matrix::new_scale(scale, scale),
                    &Colorspace::device_rgb(),
                    false,
                    false,
                )
                .map_err(mupdf_error(format!("Failed to render page {}", job.page + 1)))?;

            pixmap
                .save_as(path_str(&job.output, "output")?, ImageFormat::PNG)
                .map_err(mupdf_error(format!(
                    "Failed to write {}",
                    job.output.display()
                )))?;
            debug!(page = job.page, dpi = job.dpi, output = %job.output.display(), "rendered page");
        }

        Ok(())
    }

    fn save_optimized(&self, input: &Path, output: &Path) -> ToolkitResult<()> {
        let pdf_doc = Self::open_pdf(input)?;

        let mut options = PdfWriteOptions::default();
        options.set_garbage_level(4);
        options.set_compress(true);
        options.set_clean(true);

        pdf_doc
            .save_with_options(path_str(output, "output")?, options)
            .map_err(mupdf_error("Failed to save optimised PDF"))
    }

    fn save_encrypted(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        strength: EncryptionStrength,
    ) -> ToolkitResult<()> {
        // The writer copies passwords into fixed-size buffers.
        check_password(password)?;
        let pdf_doc = Self::open_pdf(input)?;

        let mut options = PdfWriteOptions::default();
        options.set_encryption(match strength {
            EncryptionStrength::Aes256 => Encryption::Aes256,
            EncryptionStrength::Aes128 => Encryption::Aes128,
            EncryptionStrength::Rc4_128 => Encryption::Rc4_128,
        });
        options.set_owner_password(password);
        options.set_user_password(password);

        pdf_doc
            .save_with_options(path_str(output, "output")?, options)
            .map_err(|e| ToolkitError::EncryptionFailure {
                message: e.to_string(),
            })
    }

    fn redact_text(
        &self,
        input: &Path,
        output: &Path,
        targets: &[TextTarget],
    ) -> ToolkitResult<Vec<TextHit>> {
        let pdf_doc = Self::open_pdf(input)?;
        let page_count = pdf_doc
            .page_count()
            .map_err(mupdf_error("Failed to get page count"))?
            .max(0) as usize;

        let mut by_page: BTreeMap<usize, Vec<(usize, &TextTarget)>> = BTreeMap::new();
        for (idx, target) in targets.iter().enumerate() {
            if target.page >= page_count {
                return Err(ToolkitError::IndexOutOfBounds {
                    index: target.page,
                    page_count,
                });
            }
            by_page.entry(target.page).or_default().push((idx, target));
        }

        let mut hits = Vec::new();
        for (page_idx, page_targets) in &by_page {
            hits.extend(self.redact_page(&pdf_doc, *page_idx, page_targets)?);
        }

        pdf_doc
            .save(path_str(output, "output")?)
            .map_err(mupdf_error("Failed to save redacted PDF"))?;
        Ok(hits)
    }

    fn extract_text(&self, input: &Path) -> ToolkitResult<String> {
        let bytes = std::fs::read(input).map_err(|e| ToolkitError::io(input, e))?;

        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ToolkitError::Library {
            backend: "pdf-extract".to_string(),
            message: format!("Text extraction failed for {}: {}", input.display(), e),
            source: None,
        })
    }

    fn text_spans(&self, input: &Path) -> ToolkitResult<Vec<TextSpan>> {
        let doc = Document::open(path_str(input, "input")?)
            .map_err(mupdf_error("Failed to open document with MuPDF"))?;
        let page_count = doc
            .page_count()
            .map_err(mupdf_error("Failed to get page count"))?;

        let mut spans = Vec::new();
        for page_idx in 0..page_count {
            let page = doc
                .load_page(page_idx)
                .map_err(mupdf_error(format!("Failed to load page {}", page_idx + 1)))?;
            let text_page = page
                .to_text_page(
                    TextPageOptions::PRESERVE_LIGATURES | TextPageOptions::PRESERVE_WHITESPACE,
                )
                .map_err(mupdf_error(format!("Failed to read text of page {}", page_idx + 1)))?;

            // Handles are only stable while this page's text is alive.
            let mut fonts = FontNames::default();
            for block in text_page.blocks() {
                for line in block.lines() {
                    line_spans(page_idx as usize + 1, &line, &mut fonts, &mut spans);
                }
            }
        }

        debug!(path = %input.display(), spans = spans.len(), "extracted text spans");
        Ok(spans)
    }

    fn name(&self) -> &str {
        "MuPDF"
    }
}

/// Font names by MuPDF font handle, looked up once each.
#[derive(Default)]
struct FontNames {
    names: Vec<(*mut mupdf_sys::fz_font, String)>,
}

impl FontNames {
    fn get(&mut self, font: *mut mupdf_sys::fz_font) -> String {
        if let Some((_, name)) = self.names.iter().find(|(f, _)| *f == font) {
            return name.clone();
        }
        let name = unsafe { ffi::font_name(font) };
        let name = strip_subset_tag(&name).to_string();
        self.names.push((font, name.clone()));
        name
    }
}

/// Splits one line into runs of equal font, size and colour.
fn line_spans(page: usize, line: &TextLine<'_>, fonts: &mut FontNames, spans: &mut Vec<TextSpan>) {
    let mut current: Option<TextSpan> = None;

    for ch in line.chars() {
        let Some(c) = ch.char() else {
            continue;
        };
        let (argb, font) = unsafe { ffi::char_style(&ch) };
        let font = fonts.get(font);
        let color = argb & 0x00FF_FFFF;
        let size = ch.size();
        let rect = bounding_rect(&ch.quad());

        let same_style = current
            .as_ref()
            .is_some_and(|span| span.font == font && span.size == size && span.color == color);
        match current.as_mut() {
            Some(span) if same_style => {
                span.text.push(c);
                span.bbox = [
                    span.bbox[0].min(rect.x0),
                    span.bbox[1].min(rect.y0),
                    span.bbox[2].max(rect.x1),
                    span.bbox[3].max(rect.y1),
                ];
            }
            _ => {
                spans.extend(current.take());
                current = Some(TextSpan {
                    page,
                    text: c.to_string(),
                    bbox: [rect.x0, rect.y0, rect.x1, rect.y1],
                    font,
                    size,
                    color,
                });
            }
        }
    }
    spans.extend(current);
}

/// Drops the `ABCDEF+` tag MuPDF keeps on subset font names.
fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Inverse of an affine transform, if it has one.
fn invert(m: &Matrix) -> Option<Matrix> {
    let det = m.a * m.d - m.b * m.c;
    if det.abs() < f32::EPSILON {
        return None;
    }
    let (a, b, c, d) = (m.d / det, -m.b / det, -m.c / det, m.a / det);
    Some(Matrix::new(a, b, c, d, -(m.e * a + m.f * c), -(m.e * b + m.f * d)))
}

fn rect_quad(rect: &MuRect) -> Quad {
    Quad {
        ul: Point::new(rect.x0, rect.y0),
        ur: Point::new(rect.x1, rect.y0),
        ll: Point::new(rect.x0, rect.y1),
        lr: Point::new(rect.x1, rect.y1),
    }
}

/// Maps a display-space quad to a hit in PDF user space.
fn user_space_hit(target: usize, page: usize, quad: &Quad, to_user: &Matrix) -> TextHit {
    let origin = quad.ll.transform(to_user);
    let right = quad.lr.transform(to_user);
    let top = quad.ul.transform(to_user);

    let (bx, by) = (right.x - origin.x, right.y - origin.y);
    let width = bx.hypot(by);
    let height = (top.x - origin.x).hypot(top.y - origin.y);
    let direction = if width > 0.0 {
        (bx / width, by / width)
    } else {
        (1.0, 0.0)
    };

    TextHit {
        target,
        page,
        x: origin.x,
        y: origin.y,
        width,
        height,
        direction,
    }
}

fn path_str<'a>(path: &'a Path, parameter: &str) -> ToolkitResult<&'a str> {
    path.to_str()
        .ok_or_else(|| ToolkitError::invalid_arguments(parameter, "Path contains invalid UTF-8"))
}

fn mupdf_error(message: impl Into<String>) -> impl FnOnce(mupdf::Error) -> ToolkitError {
    let message = message.into();
    move |e| ToolkitError::Library {
        backend: "MuPDF".to_string(),
        message: format!("{}: {}", message, e),
        source: Some(Box::new(e)),
    }
}

fn bounding_rect(quad: &Quad) -> MuRect {
    MuRect {
        x0: quad.ul.x.min(quad.ll.x).min(quad.ur.x).min(quad.lr.x),
        y0: quad.ul.y.min(quad.ll.y).min(quad.ur.y).min(quad.lr.y),
        x1: quad.ul.x.max(quad.ll.x).max(quad.ur.x).max(quad.lr.x),
        y1: quad.ul.y.max(quad.ll.y).max(quad.ur.y).max(quad.lr.y),
    }
}

/// Raw MuPDF calls the safe bindings do not expose.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::{Rect, TextChar};
    use std::ffi::CStr;

    /// Colour (`0xAARRGGBB`) and font handle of a structured-text character.
    ///
    /// # Safety
    /// The text page owning `ch` must be alive.
    pub unsafe fn char_style(ch: &TextChar<'_>) -> (u32, *mut mupdf_sys::fz_font) {
        #[repr(C)]
        struct RawChar {
            inner: *const mupdf_sys::fz_stext_char,
        }

        let raw = std::mem::transmute::<&TextChar<'_>, &RawChar>(ch);
        let inner = &*raw.inner;
        (inner.argb, inner.font)
    }

    /// Name of a MuPDF font, empty for a null handle.
    ///
    /// # Safety
    /// `font` must be null or a live font.
    pub unsafe fn font_name(font: *mut mupdf_sys::fz_font) -> String {
        if font.is_null() {
            return String::new();
        }
        let ctx = mupdf_sys::mupdf_new_base_context();
        if ctx.is_null() {
            return String::new();
        }

        let name = mupdf_sys::fz_font_name(ctx, font);
        let name = if name.is_null() {
            String::new()
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        };
        mupdf_sys::mupdf_drop_base_context(ctx);
        name
    }

    /// Sets the rectangle of a PDF annotation.
    ///
    /// # Safety
    /// The annotation must be live and MuPDF's base context initialised.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        #[repr(C)]
        struct RawAnnotation {
            inner: *mut mupdf_sys::pdf_annot,
        }

        let raw = std::mem::transmute::<&PdfAnnotation, &RawAnnotation>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();
        if ctx.is_null() {
            return;
        }

        let fz_rect = mupdf_sys::fz_rect {
            x0: rect.x0,
            y0: rect.y0,
            x1: rect.x1,
            y1: rect.y1,
        };
        mupdf_sys::pdf_set_annot_rect(ctx, raw.inner, fz_rect);
        mupdf_sys::mupdf_drop_base_context(ctx);
    }
}
