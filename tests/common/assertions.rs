//! Custom assertions for operation results and output documents.
//!
//! Provide better failure messages than bare `assert!` on JSON fields.

use super::pdf_helpers::{is_valid_pdf, page_count, page_widths};
use pdf_toolkit::OperationResult;
use std::path::Path;

/// Asserts that an operation succeeded.
///
/// # Panics
/// Panics with the reported message if it did not.
pub fn assert_success(result: &OperationResult) {
    assert!(
        result.success,
        "operation should succeed but failed: {}",
        result.to_json()
    );
}

/// Asserts that an operation failed with the given error kind.
pub fn assert_failure_kind(result: &OperationResult, kind: &str) {
    assert!(
        !result.success,
        "operation should fail with {} but succeeded: {}",
        kind,
        result.to_json()
    );
    assert_eq!(
        result.error_kind(),
        Some(kind),
        "unexpected error kind in {}",
        result.to_json()
    );
    assert!(!result.message.is_empty(), "failures must carry a message");
}

/// Asserts that a PDF exists, loads and has the expected page count.
pub fn assert_valid_pdf(pdf_path: &Path, expected_pages: usize) {
    assert!(
        pdf_path.exists(),
        "PDF should exist at '{}'",
        pdf_path.display()
    );
    assert!(
        is_valid_pdf(pdf_path),
        "PDF at '{}' should load and have pages",
        pdf_path.display()
    );
    let pages = page_count(pdf_path).expect("Failed to count pages");
    assert_eq!(
        pages,
        expected_pages,
        "unexpected page count in '{}'",
        pdf_path.display()
    );
}

/// Asserts the page order of a document built from [`write_sized_pages`](super::write_sized_pages).
pub fn assert_page_widths(pdf_path: &Path, expected: &[i64]) {
    let widths = page_widths(pdf_path).expect("Failed to read page widths");
    let widths: Vec<i64> = widths.iter().map(|w| w.round() as i64).collect();
    assert_eq!(widths, expected, "unexpected page order in '{}'", pdf_path.display());
}
