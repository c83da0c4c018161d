//! Conversions between PDF pages and raster images.

use super::engine::{DocumentEngine, RenderJob};
use super::page_ops::{display_name, require_files};
use super::result::OperationResult;
use crate::config::RunnerConfig;
use crate::error::{ToolkitError, ToolkitResult};
use crate::pipeline::{page_tree, save_document, TransformPipeline};
use image::{GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Raster formats accepted by `image-to-pdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Embedded as-is with `DCTDecode`.
    Jpeg,
    /// Decoded and re-stored as Flate-compressed RGB.
    Raster(ImageFormat),
}

impl ImageKind {
    /// Detects the format from the file extension, case-insensitively.
    ///
    /// Formats this build cannot decode are rejected.
    pub fn from_path(path: &Path) -> Option<Self> {
        match ImageFormat::from_path(path).ok()? {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            format if format.reading_enabled() => Some(Self::Raster(format)),
            _ => None,
        }
    }
}

/// Frame parameters read from a JPEG's marker segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    /// An Adobe APP14 segment is present; Adobe CMYK data is stored inverted.
    pub adobe: bool,
}

impl JpegInfo {
    /// Walks the marker segments up to the first start-of-frame.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.get(..2)? != [0xFF, 0xD8] {
            return None;
        }

        let mut adobe = false;
        let mut pos = 2;
        loop {
            if *data.get(pos)? != 0xFF {
                return None;
            }
            let marker = *data.get(pos + 1)?;
            pos += 2;

            match marker {
                // Fill byte before the real marker
                0xFF => pos -= 1,
                // Standalone markers carry no length
                0x01 | 0xD0..=0xD7 => {}
                // Start of scan before any frame header
                0xDA | 0xD9 => return None,
                _ => {
                    let length = usize::from(u16::from_be_bytes([
                        *data.get(pos)?,
                        *data.get(pos + 1)?,
                    ]));
                    let segment = data.get(pos + 2..pos + length)?;

                    if is_start_of_frame(marker) {
                        // precision, height, width, component count
                        let frame = segment.get(..6)?;
                        return Some(Self {
                            height: u32::from(u16::from_be_bytes([frame[1], frame[2]])),
                            width: u32::from(u16::from_be_bytes([frame[3], frame[4]])),
                            components: frame[5],
                            adobe,
                        });
                    }
                    if marker == 0xEE && segment.starts_with(b"Adobe") {
                        adobe = true;
                    }
                    pos += length;
                }
            }
        }
    }

    fn color_space(&self) -> &'static [u8] {
        match self.components {
            1 => b"DeviceGray",
            4 => b"DeviceCMYK",
            _ => b"DeviceRGB",
        }
    }
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(
        marker,
        0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF
    )
}

fn image_dict(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

/// Wraps raw JPEG bytes in a `DCTDecode` image XObject.
fn jpeg_stream(bytes: Vec<u8>, info: &JpegInfo) -> Stream {
    let mut dict = image_dict(info.width, info.height, info.color_space());
    if info.components == 4 && info.adobe {
        dict.set(
            "Decode",
            Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
        );
    }
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    Stream::new(dict, bytes).with_compression(false)
}

/// Builds a one-page document showing the image at its pixel size.
///
/// JPEG data is embedded as-is in its own colour space; anything else is
/// decoded and stored as Flate-compressed RGB.
pub fn image_page(path: &Path, kind: ImageKind) -> ToolkitResult<Document> {
    let bytes = fs::read(path).map_err(|e| ToolkitError::io(path, e))?;

    let (width, height, image_stream) = match kind {
        ImageKind::Jpeg => {
            // Decoding validates the scan data, the header gives the colour model.
            image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
            let info = JpegInfo::parse(&bytes).ok_or_else(|| {
                ToolkitError::invalid_format(&path.display().to_string(), "Missing JPEG frame header")
            })?;
            (info.width, info.height, jpeg_stream(bytes, &info))
        }
        ImageKind::Raster(format) => {
            let decoded = image::load_from_memory_with_format(&bytes, format)?;
            let (width, height) = decoded.dimensions();
            let dict = image_dict(width, height, b"DeviceRGB");
            (width, height, Stream::new(dict, decoded.to_rgb8().into_raw()))
        }
    };

    let mut doc = page_tree::blank_document();
    let root = page_tree::root_pages_id(&doc)?;
    let image_id = doc.add_object(Object::Stream(image_stream));

    let (w, h) = (width as f32, height as f32);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w as _),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(h as _),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        content.encode()?,
    )));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(root));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(i64::from(width)),
            Object::Integer(i64::from(height)),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(Object::Dictionary(page));

    page_tree::write_kids(&mut doc, root, &[page_id])?;
    doc.compress();
    debug!(path = %path.display(), width, height, ?kind, "embedded image");
    Ok(doc)
}

/// Assembles one page per image, in the given order.
///
/// `images` is a comma-separated list; files in a format that cannot be
/// decoded are skipped.
pub fn image_to_pdf(images: &str, output: &Path) -> ToolkitResult<OperationResult> {
    let paths: Vec<PathBuf> = images
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect();
    if paths.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "images",
            "No image files were given",
        ));
    }
    require_files(paths.iter().map(PathBuf::as_path))?;

    let mut pipeline = TransformPipeline::new();
    for path in &paths {
        match ImageKind::from_path(path) {
            Some(kind) => pipeline = pipeline.append(image_page(path, kind)?),
            None => warn!(path = %path.display(), "skipping unsupported image format"),
        }
    }
    if pipeline.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "images",
            "No supported images (png, jpeg, bmp, tga, pnm, ico) were given",
        ));
    }

    let pages = pipeline.len();
    let mut doc = pipeline.apply(&page_tree::blank_document())?;
    save_document(&mut doc, output)?;

    Ok(OperationResult::ok(format!(
        "Successfully converted {} images to {}",
        pages,
        display_name(output)
    ))
    .with("pageCount", pages))
}

fn path_strings(jobs: &[RenderJob]) -> Vec<String> {
    jobs.iter()
        .map(|job| job.output.to_string_lossy().into_owned())
        .collect()
}

fn prepare_output_dir(dir: &Path) -> ToolkitResult<()> {
    fs::create_dir_all(dir).map_err(|e| ToolkitError::io(dir, e))
}

/// Renders every page to `page_N.png` (one-based) inside `output_dir`.
pub fn pdf_to_image(
    engine: &dyn DocumentEngine,
    config: &RunnerConfig,
    input: &Path,
    output_dir: &Path,
) -> ToolkitResult<OperationResult> {
    require_files([input])?;
    prepare_output_dir(output_dir)?;

    let page_count = engine.page_count(input)?;
    let jobs: Vec<RenderJob> = (0..page_count)
        .map(|page| RenderJob {
            page,
            dpi: config.raster_dpi,
            output: output_dir.join(format!("page_{}.png", page + 1)),
        })
        .collect();
    engine.render_pages(input, &jobs)?;

    Ok(OperationResult::ok(format!(
        "Successfully converted {} pages to images",
        page_count
    ))
    .with("pageCount", page_count)
    .with("filePaths", path_strings(&jobs)))
}

/// Renders preview images.
///
/// `page == -1` renders a thumbnail of every page to `preview_<i>.png`;
/// otherwise the zero-based page is rendered to `preview_page.png`.
pub fn preview(
    engine: &dyn DocumentEngine,
    config: &RunnerConfig,
    input: &Path,
    page: i64,
    output_dir: &Path,
) -> ToolkitResult<OperationResult> {
    require_files([input])?;
    let page_count = engine.page_count(input)?;

    if page == -1 {
        prepare_output_dir(output_dir)?;
        let jobs: Vec<RenderJob> = (0..page_count)
            .map(|index| RenderJob {
                page: index,
                dpi: config.thumbnail_dpi,
                output: output_dir.join(format!("preview_{}.png", index)),
            })
            .collect();
        engine.render_pages(input, &jobs)?;

        return Ok(
            OperationResult::ok(format!("Generated {} page previews", page_count))
                .with("filePaths", path_strings(&jobs))
                .with("pageCount", page_count),
        );
    }

    let index = usize::try_from(page)
        .ok()
        .filter(|index| *index < page_count)
        .ok_or(ToolkitError::OutOfRange { page, page_count })?;

    prepare_output_dir(output_dir)?;
    let job = RenderJob {
        page: index,
        dpi: config.preview_dpi,
        output: output_dir.join("preview_page.png"),
    };
    engine.render_pages(input, std::slice::from_ref(&job))?;

    Ok(
        OperationResult::ok(format!("Generated preview of page {}", index + 1))
            .with("filePath", job.output.to_string_lossy())
            .with("pageCount", page_count),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageBuffer, Luma, Rgb};

    #[test]
    fn test_image_kind_from_extension() {
        assert_eq!(
            ImageKind::from_path(Path::new("a.PNG")),
            Some(ImageKind::Raster(ImageFormat::Png))
        );
        assert_eq!(ImageKind::from_path(Path::new("b.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("c.JPG")), Some(ImageKind::Jpeg));
        assert_eq!(
            ImageKind::from_path(Path::new("d.bmp")),
            Some(ImageKind::Raster(ImageFormat::Bmp))
        );
        assert_eq!(ImageKind::from_path(Path::new("e.txt")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
    }

    /// SOI, an optional Adobe APP14 segment, then a baseline SOF0 header.
    fn jpeg_header(components: u8, adobe: bool) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        // JFIF APP0 first, as most encoders write it
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
        if adobe {
            bytes.extend_from_slice(&[
                0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00,
                0x00, 0x00, 0x02,
            ]);
        }
        let length = 8 + 3 * u16::from(components);
        bytes.extend_from_slice(&[0xFF, 0xC0]);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&[0x08, 0x00, 0x20, 0x00, 0x30, components]);
        for id in 1..=components {
            bytes.extend_from_slice(&[id, 0x11, 0x00]);
        }
        bytes
    }

    #[test]
    fn test_jpeg_header_components() {
        let gray = JpegInfo::parse(&jpeg_header(1, false)).unwrap();
        assert_eq!((gray.width, gray.height), (48, 32));
        assert_eq!(gray.color_space(), b"DeviceGray");

        let rgb = JpegInfo::parse(&jpeg_header(3, false)).unwrap();
        assert_eq!(rgb.color_space(), b"DeviceRGB");

        let cmyk = JpegInfo::parse(&jpeg_header(4, true)).unwrap();
        assert_eq!(cmyk.components, 4);
        assert!(cmyk.adobe);
        assert_eq!(cmyk.color_space(), b"DeviceCMYK");
    }

    #[test]
    fn test_jpeg_header_rejects_truncated_data() {
        assert_eq!(JpegInfo::parse(b"\x89PNG"), None);
        let header = jpeg_header(3, false);
        assert_eq!(JpegInfo::parse(&header[..header.len() - 4]), None);
        assert_eq!(JpegInfo::parse(&[0xFF, 0xD8, 0xFF, 0xDA]), None);
        // frame header too short to hold its own fields
        assert_eq!(
            JpegInfo::parse(&[0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x05, 0x08, 0x00, 0x20]),
            None
        );
    }

    #[test]
    fn test_cmyk_jpeg_stream_is_inverted_cmyk() {
        let header = jpeg_header(4, true);
        let info = JpegInfo::parse(&header).unwrap();
        let stream = jpeg_stream(header, &info);

        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceCMYK");
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        let decode = stream.dict.get(b"Decode").unwrap().as_array().unwrap();
        assert_eq!(decode.len(), 8);
        assert_eq!(decode[0].as_i64().unwrap(), 1);
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 48);
    }

    #[test]
    fn test_plain_cmyk_and_rgb_jpeg_have_no_decode_array() {
        for components in [3, 4] {
            let header = jpeg_header(components, false);
            let info = JpegInfo::parse(&header).unwrap();
            assert!(!jpeg_stream(header, &info).dict.has(b"Decode"));
        }
    }

    #[test]
    fn test_gray_jpeg_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.jpg");
        ImageBuffer::from_pixel(24, 12, Luma([128u8])).save(&path).unwrap();

        let doc = image_page(&path, ImageKind::Jpeg).unwrap();
        let stream = doc
            .objects
            .values()
            .find_map(|object| match object {
                Object::Stream(stream) if stream.dict.has(b"Subtype") => Some(stream),
                _ => None,
            })
            .unwrap();
        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
    }

    #[test]
    fn test_bmp_page_uses_pixel_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.bmp");
        ImageBuffer::from_pixel(20, 10, Rgb([0u8, 0, 255])).save(&path).unwrap();

        let kind = ImageKind::from_path(&path).unwrap();
        let doc = image_page(&path, kind).unwrap();
        let pages = page_tree::page_ids(&doc);
        assert_eq!(page_tree::page_size(&doc, pages[0]).unwrap(), (20.0, 10.0));
    }

    #[test]
    fn test_image_page_uses_pixel_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        ImageBuffer::from_pixel(40, 30, Rgb([255u8, 0, 0]))
            .save(&path)
            .unwrap();

        let doc = image_page(&path, ImageKind::Raster(ImageFormat::Png)).unwrap();
        let pages = page_tree::page_ids(&doc);
        assert_eq!(pages.len(), 1);
        assert_eq!(page_tree::page_size(&doc, pages[0]).unwrap(), (40.0, 30.0));
    }

    #[test]
    fn test_image_to_pdf_requires_images() {
        let err = image_to_pdf(" , ", Path::new("out.pdf")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn test_image_to_pdf_skips_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        fs::write(&text, "hello").unwrap();

        let err = image_to_pdf(text.to_str().unwrap(), &dir.path().join("out.pdf")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }
}
