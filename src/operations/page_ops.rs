//! Page-level operations built on the transform pipeline: merge, split,
//! organize and rotate.

use super::result::OperationResult;
use crate::config::RunnerConfig;
use crate::domain::{parse_page_spec, OutOfRangePolicy, PageIndexSet, RotationMap};
use crate::error::{ToolkitError, ToolkitResult};
use crate::pipeline::{load_document, save_document, TransformPipeline};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of `path` for user-facing messages.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Fails with `FileNotFound` unless every path exists.
pub(crate) fn require_files<'a>(paths: impl IntoIterator<Item = &'a Path>) -> ToolkitResult<()> {
    for path in paths {
        if !path.exists() {
            return Err(ToolkitError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Concatenates every page of every input, in input order.
///
/// `inputs` is a JSON array of at least two paths.
pub fn merge(inputs: &str, output: &Path) -> ToolkitResult<OperationResult> {
    let paths: Vec<PathBuf> = serde_json::from_str(inputs)
        .map_err(|e| ToolkitError::invalid_format(inputs, e.to_string()))?;
    if paths.len() < 2 {
        return Err(ToolkitError::invalid_arguments(
            "inputs",
            "At least two PDF files are required for merging",
        ));
    }
    require_files(paths.iter().map(PathBuf::as_path))?;

    let first = load_document(&paths[0])?;
    let mut pipeline = TransformPipeline::new();
    for path in &paths[1..] {
        pipeline = pipeline.append(load_document(path)?);
    }

    let mut merged = pipeline.apply(&first)?;
    let page_count = merged.get_pages().len();
    save_document(&mut merged, output)?;
    info!(files = paths.len(), pages = page_count, "merged documents");

    Ok(OperationResult::ok(format!(
        "Successfully merged {} files into {}",
        paths.len(),
        display_name(output)
    ))
    .with("pageCount", page_count))
}

/// Writes the selected pages, in selection order, to `output`.
pub fn split(
    config: &RunnerConfig,
    input: &Path,
    pages: &str,
    output: &Path,
) -> ToolkitResult<OperationResult> {
    let source = load_document(input)?;
    let selection = parse_page_spec(pages, source.get_pages().len(), config.out_of_range)?;
    if selection.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "pages",
            "No valid pages were selected",
        ));
    }

    let selected = selection.len();
    let mut doc = TransformPipeline::new().keep(selection).apply(&source)?;
    save_document(&mut doc, output)?;

    Ok(OperationResult::ok(format!(
        "Successfully extracted {} pages to {}",
        selected,
        display_name(output)
    ))
    .with("pageCount", selected))
}

/// Reorders pages by `order` and drops those listed in `delete`.
///
/// A blank `order` keeps the current page order.
pub fn organize(
    config: &RunnerConfig,
    input: &Path,
    order: &str,
    delete: &str,
    output: &Path,
) -> ToolkitResult<OperationResult> {
    let source = load_document(input)?;
    let page_count = source.get_pages().len();

    let order = if order.trim().is_empty() {
        PageIndexSet::all(page_count)
    } else {
        parse_page_spec(order, page_count, config.out_of_range)?
    };
    let delete = parse_page_spec(delete, page_count, config.out_of_range)?;
    let keep = order.without(&delete);
    debug!(order = ?order.as_slice(), delete = ?delete.as_slice(), "organizing pages");

    if keep.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "order",
            "The organized document would have no pages",
        ));
    }

    let kept = keep.len();
    let mut doc = TransformPipeline::new().keep(keep).apply(&source)?;
    save_document(&mut doc, output)?;

    Ok(OperationResult::ok(format!("Successfully organized PDF with {} pages", kept))
        .with("pageCount", kept))
}

/// Adds the mapped rotation to each listed page.
pub fn rotate(
    config: &RunnerConfig,
    input: &Path,
    rotations: &str,
    output: &Path,
) -> ToolkitResult<OperationResult> {
    let map = RotationMap::from_json(rotations)?;
    let source = load_document(input)?;
    let page_count = source.get_pages().len();

    let mut pipeline = TransformPipeline::new();
    let mut rotated = 0;
    for (page, rotation) in map.iter() {
        if page == 0 || page > page_count as u64 {
            match config.out_of_range {
                OutOfRangePolicy::Reject => {
                    return Err(ToolkitError::OutOfRange {
                        page: i64::try_from(page).unwrap_or(i64::MAX),
                        page_count,
                    })
                }
                OutOfRangePolicy::Skip => continue,
            }
        }
        if rotation.is_none() {
            continue;
        }
        pipeline = pipeline.rotate((page - 1) as usize, i64::from(rotation.degrees()));
        rotated += 1;
    }

    let mut doc = pipeline.apply(&source)?;
    save_document(&mut doc, output)?;

    Ok(OperationResult::ok(format!("Successfully rotated {} pages", rotated))
        .with("rotatedPages", rotated))
}
