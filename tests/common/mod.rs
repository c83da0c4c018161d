//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Test fixtures and builders
//! - Result and document assertions
//! - PDF inspection helpers

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod pdf_helpers;

pub use assertions::*;
pub use fixtures::*;
pub use pdf_helpers::*;

use std::sync::{Mutex, MutexGuard};

static MUPDF_LOCK: Mutex<()> = Mutex::new(());

/// Serialises MuPDF work across the tests of one binary.
///
/// MuPDF's font initialisation is not safe to race.
pub fn mupdf_guard() -> MutexGuard<'static, ()> {
    MUPDF_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
