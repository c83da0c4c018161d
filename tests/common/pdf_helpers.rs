//! PDF inspection helpers.

use anyhow::{anyhow, Context, Result};
use lopdf::{Document, Object};
use pdf_toolkit::OperationResult;
use serde_json::Value;
use std::path::Path;

/// Extracts text from a PDF, returning an error instead of panicking.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    pdf_extract::extract_text(pdf_path).map_err(|e| anyhow!("Failed to extract text: {}", e))
}

pub fn page_count(pdf_path: &Path) -> Result<usize> {
    Ok(Document::load(pdf_path)?.get_pages().len())
}

/// MediaBox widths of every page, in page order.
pub fn page_widths(pdf_path: &Path) -> Result<Vec<f32>> {
    let doc = Document::load(pdf_path)?;
    doc.get_pages()
        .into_values()
        .map(|id| {
            let media_box = inherited(&doc, id, b"MediaBox")?
                .ok_or_else(|| anyhow!("page {:?} has no MediaBox", id))?;
            let values = media_box.as_array()?;
            let x0 = values[0].as_float()?;
            let x1 = values[2].as_float()?;
            Ok((x1 - x0).abs())
        })
        .collect()
}

/// Effective /Rotate of every page, in page order.
pub fn page_rotations(pdf_path: &Path) -> Result<Vec<i64>> {
    let doc = Document::load(pdf_path)?;
    doc.get_pages()
        .into_values()
        .map(|id| {
            Ok(match inherited(&doc, id, b"Rotate")? {
                Some(value) => value.as_i64()?,
                None => 0,
            })
        })
        .collect()
}

fn inherited(doc: &Document, mut id: lopdf::ObjectId, key: &[u8]) -> Result<Option<Object>> {
    loop {
        let dict = doc.get_dictionary(id)?;
        if let Ok(value) = dict.get(key) {
            let value = match value {
                Object::Reference(r) => doc.get_object(*r)?.clone(),
                other => other.clone(),
            };
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => id = parent,
            Err(_) => return Ok(None),
        }
    }
}

/// Gets the file size of a PDF in bytes.
pub fn pdf_size(pdf_path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(pdf_path)?.len())
}

/// Validates that a PDF is loadable and has at least one page.
pub fn is_valid_pdf(pdf_path: &Path) -> bool {
    Document::load(pdf_path)
        .map(|doc| !doc.get_pages().is_empty())
        .unwrap_or(false)
}

/// Parses the single JSON object a command printed on stdout.
pub fn parse_single_json(stdout: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(stdout)?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() != 1 {
        return Err(anyhow!("expected one JSON line, got {}: {:?}", lines.len(), text));
    }
    serde_json::from_str(lines[0]).context("stdout is not JSON")
}

/// The `textBlocks` entries of an `edit-text extract` result.
pub fn text_blocks(result: &OperationResult) -> Vec<Value> {
    result
        .get("textBlocks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// First text block whose text contains `needle`.
pub fn block_containing(result: &OperationResult, needle: &str) -> Option<Value> {
    text_blocks(result).into_iter().find(|block| {
        block
            .get("text")
            .and_then(Value::as_str)
            .is_some_and(|text| text.contains(needle))
    })
}

/// A block's `bbox` as `[x0, y0, x1, y1]`.
pub fn block_bbox(block: &Value) -> [f64; 4] {
    let values: Vec<f64> = block["bbox"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();
    assert_eq!(values.len(), 4, "bbox should have four numbers: {}", block);
    [values[0], values[1], values[2], values[3]]
}
