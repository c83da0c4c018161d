//! Text extraction and in-place text replacement.

use super::engine::{DocumentEngine, TextTarget};
use super::overlay;
use super::page_ops::require_files;
use super::result::OperationResult;
use crate::config::RunnerConfig;
use crate::domain::{OutOfRangePolicy, TextReplacement};
use crate::error::{ToolkitError, ToolkitResult};
use crate::pipeline::{load_document, save_document, StagedOutput};
use std::path::Path;
use tracing::info;

/// Returns the document's text, both plain and as positioned spans.
///
/// Each entry of `textBlocks` is one span: `page` (one-based), `text`,
/// `bbox`, `font`, `size` and `color`.
pub fn extract(engine: &dyn DocumentEngine, input: &Path) -> ToolkitResult<OperationResult> {
    require_files([input])?;
    let text = engine.extract_text(input)?;
    let spans = engine.text_spans(input)?;

    Ok(OperationResult::ok(format!(
        "Extracted {} characters in {} text blocks",
        text.chars().count(),
        spans.len()
    ))
    .with("text", text)
    .with("textBlocks", spans))
}

/// Replaces text occurrences page by page.
///
/// Each occurrence of `oldText` is physically removed by the engine, then
/// `newText` is drawn where it used to be. A replacement with a `bbox`
/// clears that area instead of searching. `output` may be `input`.
pub fn replace(
    engine: &dyn DocumentEngine,
    config: &RunnerConfig,
    input: &Path,
    replacements: &str,
    output: &Path,
) -> ToolkitResult<OperationResult> {
    let replacements = TextReplacement::list_from_json(replacements)?;
    if replacements.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "replacements",
            "No replacements were given",
        ));
    }
    require_files([input])?;
    let page_count = engine.page_count(input)?;

    // `targets[i]` and `kept[i]` describe the same replacement.
    let mut targets = Vec::with_capacity(replacements.len());
    let mut kept = Vec::with_capacity(replacements.len());
    for replacement in replacements {
        if replacement.page == 0 || replacement.page > page_count as u64 {
            match config.out_of_range {
                OutOfRangePolicy::Reject => {
                    return Err(ToolkitError::OutOfRange {
                        page: i64::try_from(replacement.page).unwrap_or(i64::MAX),
                        page_count,
                    })
                }
                OutOfRangePolicy::Skip => continue,
            }
        }
        targets.push(TextTarget {
            page: (replacement.page - 1) as usize,
            text: replacement.old_text.clone(),
            bbox: replacement.bbox,
        });
        kept.push(replacement);
    }

    let staged = StagedOutput::new(output)?;
    let hits = engine.redact_text(input, staged.path(), &targets)?;
    if !hits.is_empty() {
        let mut doc = load_document(staged.path())?;
        overlay::draw_replacements(&mut doc, &hits, &kept)?;
        save_document(&mut doc, staged.path())?;
    }
    staged.commit()?;
    info!(requested = targets.len(), replaced = hits.len(), "replaced text");

    Ok(
        OperationResult::ok(format!("Replaced {} text occurrences", hits.len()))
            .with("replacements", hits.len()),
    )
}
