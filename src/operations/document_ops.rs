//! Whole-document rewrites: compress, watermark and protect.

use super::engine::DocumentEngine;
use super::overlay;
use super::page_ops::{display_name, require_files};
use super::result::OperationResult;
use crate::config::RunnerConfig;
use crate::domain::WatermarkOptions;
use crate::error::{ToolkitError, ToolkitResult};
use crate::pipeline::{load_document, save_document, StagedOutput};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Longest password MuPDF's writer can hold, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 127;

/// Rejects passwords the PDF writer cannot store.
///
/// MuPDF copies the password into fixed 128-byte buffers with a trailing
/// NUL, so longer values or embedded NULs must never reach it.
pub fn check_password(password: &str) -> ToolkitResult<()> {
    if password.is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "password",
            "Password must not be empty",
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ToolkitError::invalid_arguments(
            "password",
            format!(
                "Password is {} bytes long; at most {} are supported",
                password.len(),
                MAX_PASSWORD_BYTES
            ),
        ));
    }
    if password.contains('\0') {
        return Err(ToolkitError::invalid_arguments(
            "password",
            "Password must not contain NUL characters",
        ));
    }
    Ok(())
}

fn file_size(path: &Path) -> ToolkitResult<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| ToolkitError::io(path, e))
}

/// Re-saves the document with the engine's optimisation flags.
///
/// The output is never larger than the input: when optimisation does not
/// pay off, the input bytes are written unchanged. `output` may be `input`.
pub fn compress(
    engine: &dyn DocumentEngine,
    input: &Path,
    output: &Path,
) -> ToolkitResult<OperationResult> {
    require_files([input])?;
    let original = file_size(input)?;

    let staged = StagedOutput::new(output)?;
    engine.save_optimized(input, staged.path())?;
    let mut compressed = file_size(staged.path())?;
    if compressed > original {
        debug!(original, compressed, "optimised output larger than input, keeping input");
        fs::copy(input, staged.path()).map_err(|e| ToolkitError::io(staged.path(), e))?;
        compressed = original;
    }
    staged.commit()?;

    let reduction = if original > 0 {
        (original - compressed) as f64 / original as f64 * 100.0
    } else {
        0.0
    };
    info!(original, compressed, "compressed document");

    Ok(OperationResult::ok(format!(
        "Compressed by {:.1}%. New size: {:.1} KB",
        reduction,
        compressed as f64 / 1024.0
    ))
    .with("originalSize", original)
    .with("compressedSize", compressed))
}

/// Draws the watermark described by `options` (JSON) on every page.
pub fn watermark(input: &Path, output: &Path, options: &str) -> ToolkitResult<OperationResult> {
    let options = if options.trim().is_empty() {
        WatermarkOptions::default()
    } else {
        WatermarkOptions::from_json(options)?
    };

    let mut doc = load_document(input)?;
    let pages = overlay::stamp_watermark(&mut doc, &options)?;
    save_document(&mut doc, output)?;

    Ok(OperationResult::ok(format!(
        "Watermark added to {} pages of {}",
        pages,
        display_name(output)
    ))
    .with("pageCount", pages))
}

/// Encrypts the document with `password` as owner and user password.
pub fn protect(
    engine: &dyn DocumentEngine,
    config: &RunnerConfig,
    input: &Path,
    output: &Path,
    password: &str,
) -> ToolkitResult<OperationResult> {
    check_password(password)?;
    require_files([input])?;

    let staged = StagedOutput::new(output)?;
    engine.save_encrypted(input, staged.path(), password, config.encryption)?;
    staged.commit()?;
    info!(strength = ?config.encryption, "protected document");

    Ok(OperationResult::ok(format!(
        "PDF protected successfully: {}",
        display_name(output)
    )))
}
