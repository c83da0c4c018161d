//! Test fixtures and PDF builders.
//!
//! Provides builders for creating test PDFs and images with known content.

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Builder for creating text PDFs with one or more pages.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let pdf = TestPdfBuilder::new()
///     .with_title("Quarterly Report")
///     .with_page(&["First page"])
///     .with_page(&["Second page"])
///     .build(Path::new("/tmp/report.pdf"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    pages: Vec<Vec<String>>,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    /// Creates a new builder for an A4 document.
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            pages: Vec::new(),
            page_width: Mm(210.0),
            page_height: Mm(297.0),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Adds a page holding the given lines of text.
    pub fn with_page(mut self, lines: &[&str]) -> Self {
        self.pages
            .push(lines.iter().map(|line| line.to_string()).collect());
        self
    }

    /// Adds `count` pages labelled "Page 1", "Page 2", ...
    pub fn with_numbered_pages(mut self, count: usize) -> Self {
        for n in 1..=count {
            self.pages.push(vec![format!("Page {}", n)]);
        }
        self
    }

    pub fn with_dimensions(mut self, width: f32, height: f32) -> Self {
        self.page_width = Mm(width);
        self.page_height = Mm(height);
        self
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let pages = if self.pages.is_empty() {
            vec![vec![self.title.clone()]]
        } else {
            self.pages
        };

        let (doc, page1, layer1) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        for (i, lines) in pages.iter().enumerate() {
            let layer = if i == 0 {
                doc.get_page(page1).get_layer(layer1)
            } else {
                let (page, layer) = doc.add_page(self.page_width, self.page_height, "Layer 1");
                doc.get_page(page).get_layer(layer)
            };

            for (row, line) in lines.iter().enumerate() {
                let y = 270.0 - row as f32 * 10.0;
                layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &font);
            }
        }

        doc.save(&mut BufWriter::new(fs::File::create(output_path)?))?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a PDF whose pages are told apart by their MediaBox width.
///
/// Page `i` is `widths[i]` points wide and 792 points tall.
pub fn write_sized_pages(path: &Path, widths: &[i64]) -> Result<PathBuf> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(widths.len());
    for (i, width) in widths.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24_i64.into()]),
                Operation::new("Td", vec![36_i64.into(), 700_i64.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), (*width).into(), 792_i64.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => widths.len() as i64,
            "Kids" => kids,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(path.to_path_buf())
}

/// Page geometry for [`write_boxed_text_page`].
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub media_box: [i64; 4],
    pub crop_box: Option<[i64; 4]>,
    pub rotate: i64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            media_box: [0, 0, 612, 792],
            crop_box: None,
            rotate: 0,
        }
    }
}

/// Writes a one-page PDF with `text` in 12pt Helvetica at user-space `at`.
pub fn write_boxed_text_page(
    path: &Path,
    geometry: PageGeometry,
    text: &str,
    at: (i64, i64),
) -> Result<PathBuf> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12_i64.into()]),
            Operation::new("Td", vec![at.0.into(), at.1.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let as_array = |rect: [i64; 4]| -> Object { rect.map(Object::Integer).to_vec().into() };
    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => as_array(geometry.media_box),
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    };
    if let Some(crop_box) = geometry.crop_box {
        page.set("CropBox", as_array(crop_box));
    }
    if geometry.rotate != 0 {
        page.set("Rotate", geometry.rotate);
    }
    let page_id = doc.add_object(page);

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1_i64,
            "Kids" => vec![Object::from(page_id)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(path.to_path_buf())
}

/// Writes a solid-colour BMP.
pub fn write_bmp(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([30, 200, 30]));
    img.save_with_format(path, ::image::ImageFormat::Bmp)?;
    Ok(path.to_path_buf())
}

/// Writes a PDF with large uncompressed, highly repetitive content streams.
pub fn write_bloated_pdf(path: &Path, pages: usize) -> Result<PathBuf> {
    let widths = vec![612; pages];
    write_sized_pages(path, &widths)?;

    let mut doc = Document::load(path)?;
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let mut operations = Vec::new();
        for row in 0..400_i64 {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 8_i64.into()]));
            operations.push(Operation::new("Td", vec![36_i64.into(), ((row % 90) * 8).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal("The quick brown fox jumps over the lazy dog")],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let bytes = Content { operations }.encode()?;
        let stream_id = doc.add_object(Stream::new(dictionary! {}, bytes).with_compression(false));
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", stream_id);
    }
    doc.prune_objects();
    doc.save(path)?;
    Ok(path.to_path_buf())
}

/// Writes a solid-colour PNG.
pub fn write_png(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([200, 30, 30]));
    img.save_with_format(path, ::image::ImageFormat::Png)?;
    Ok(path.to_path_buf())
}

/// Writes a solid-colour JPEG.
pub fn write_jpeg(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([30, 30, 200]));
    img.save_with_format(path, ::image::ImageFormat::Jpeg)?;
    Ok(path.to_path_buf())
}
