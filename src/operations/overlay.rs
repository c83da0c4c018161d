//! Content-stream overlays drawn on top of existing pages.
//!
//! The original page content is wrapped in `q`/`Q` so that whatever state
//! it leaves behind cannot leak into the overlay. Overlay text uses the
//! standard Helvetica font, so nothing needs to be embedded.

use super::engine::TextHit;
use crate::domain::{TextReplacement, WatermarkOptions};
use crate::error::ToolkitResult;
use crate::pipeline::page_tree;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Resource name of the overlay font.
const FONT_NAME: &str = "TkHelv";

/// Resource name of the overlay transparency state.
const STATE_NAME: &str = "TkAlpha";

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

/// Width used for characters outside printable ASCII.
const FALLBACK_WIDTH: u16 = 556;

/// Rendered width of `text` in Helvetica at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => u32::from(HELVETICA_WIDTHS[(code - 32) as usize]),
            _ => u32::from(FALLBACK_WIDTH),
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Encodes `text` as a WinAnsi string literal. Characters the encoding
/// cannot represent become `?`.
pub fn encode_text(text: &str) -> Object {
    let bytes: Vec<u8> = text
        .chars()
        .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
        .collect();
    Object::string_literal(bytes)
}

fn real(value: f32) -> Object {
    Object::Real(value as _)
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Adds a Helvetica font dictionary and returns its id.
pub fn add_helvetica(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica"));
    font.set("Encoding", name("WinAnsiEncoding"));
    doc.add_object(Object::Dictionary(font))
}

/// Adds an ExtGState with the given fill and stroke opacity.
pub fn add_opacity_state(doc: &mut Document, opacity: f32) -> ObjectId {
    let mut state = Dictionary::new();
    state.set("Type", name("ExtGState"));
    state.set("ca", real(opacity));
    state.set("CA", real(opacity));
    doc.add_object(Object::Dictionary(state))
}

/// Clones the dictionary an entry holds, following one indirection.
fn resolved_dictionary(doc: &Document, object: Option<&Object>) -> Dictionary {
    match object {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Makes the overlay font (and optionally the opacity state) available to
/// the page.
///
/// Shared resource dictionaries are copied inline so other pages are not
/// affected.
pub fn register_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    state_id: Option<ObjectId>,
) -> ToolkitResult<()> {
    let page = doc.get_dictionary(page_id)?;
    let mut resources = resolved_dictionary(doc, page.get(b"Resources").ok());

    let mut fonts = resolved_dictionary(doc, resources.get(b"Font").ok());
    fonts.set(FONT_NAME, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    if let Some(state_id) = state_id {
        let mut states = resolved_dictionary(doc, resources.get(b"ExtGState").ok());
        states.set(STATE_NAME, Object::Reference(state_id));
        resources.set("ExtGState", Object::Dictionary(states));
    }

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Draws `operations` above the existing page content.
pub fn append_layer(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> ToolkitResult<()> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut layer = b"Q\n".to_vec();
    layer.extend(Content { operations }.encode()?);

    let open_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));
    let layer_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), layer)));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(layer_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Operations drawing the watermark centred in `bbox`.
pub fn watermark_operations(options: &WatermarkOptions, bbox: [f32; 4]) -> Vec<Operation> {
    let size = options.size.font_size();
    let width = text_width(&options.text, size);
    let (sin, cos) = options.orientation.angle().to_radians().sin_cos();
    let (cx, cy) = ((bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0);

    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![name(STATE_NAME)]),
        Operation::new("g", vec![real(options.gray)]),
        Operation::new(
            "cm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(cx), real(cy)],
        ),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![name(FONT_NAME), real(size)]),
        // Cap height of Helvetica is roughly 0.7 em.
        Operation::new("Td", vec![real(-width / 2.0), real(-size * 0.35)]),
        Operation::new("Tj", vec![encode_text(&options.text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Stamps the watermark on every page. Returns the number of pages stamped.
pub fn stamp_watermark(doc: &mut Document, options: &WatermarkOptions) -> ToolkitResult<usize> {
    let (_, pages) = page_tree::flatten(doc)?;
    let font_id = add_helvetica(doc);
    let state_id = add_opacity_state(doc, options.opacity);

    for &page_id in &pages {
        let bbox = page_tree::page_box(doc, page_id)?;
        register_resources(doc, page_id, font_id, Some(state_id))?;
        append_layer(doc, page_id, watermark_operations(options, bbox))?;
    }

    Ok(pages.len())
}

/// Operations painting over a removed occurrence and writing `text` there.
pub fn replacement_operations(
    hit: &TextHit,
    text: &str,
    size: f32,
    rgb: [f32; 3],
) -> Vec<Operation> {
    let (dx, dy) = hit.direction;
    let (ux, uy) = hit.up();
    // Quads include descenders; lift the baseline off the bottom edge.
    let lift = hit.height * 0.2;
    let [ll, lr, ur, ul] = hit.corners();

    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![real(1.0)]),
        Operation::new("m", vec![real(ll.0), real(ll.1)]),
        Operation::new("l", vec![real(lr.0), real(lr.1)]),
        Operation::new("l", vec![real(ur.0), real(ur.1)]),
        Operation::new("l", vec![real(ul.0), real(ul.1)]),
        Operation::new("h", vec![]),
        Operation::new("f", vec![]),
        Operation::new("rg", rgb.iter().map(|&c| real(c)).collect()),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![name(FONT_NAME), real(size)]),
        Operation::new(
            "Tm",
            vec![
                real(dx),
                real(dy),
                real(ux),
                real(uy),
                real(hit.x + ux * lift),
                real(hit.y + uy * lift),
            ],
        ),
        Operation::new("Tj", vec![encode_text(text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Writes each replacement's new text at the position of its hits.
///
/// `hits[i].target` indexes into `replacements`.
pub fn draw_replacements(
    doc: &mut Document,
    hits: &[TextHit],
    replacements: &[TextReplacement],
) -> ToolkitResult<()> {
    if hits.is_empty() {
        return Ok(());
    }

    let pages = page_tree::page_ids(doc);
    let mut by_page: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();
    for hit in hits {
        let Some(replacement) = replacements.get(hit.target) else {
            continue;
        };
        by_page.entry(hit.page).or_default().extend(replacement_operations(
            hit,
            &replacement.new_text,
            replacement.size,
            replacement.color.rgb(),
        ));
    }

    let font_id = add_helvetica(doc);
    for (page, operations) in by_page {
        let Some(&page_id) = pages.get(page) else {
            continue;
        };
        register_resources(doc, page_id, font_id, None)?;
        append_layer(doc, page_id, operations)?;
    }
    Ok(())
}
