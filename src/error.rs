//! Error types for the PDF toolkit.
//!
//! Every failure is categorised so that the operation boundary can report
//! it in-band as a tagged `{success: false, error, message}` result.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for toolkit operations.
pub type ToolkitResult<T> = Result<T, ToolkitError>;

/// Error type shared by the selector, the pipeline and every operation.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// Missing or malformed command-line input
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidArguments { parameter: String, reason: String },

    /// Input path does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Malformed page spec, rotation map or JSON option payload
    #[error("Invalid format '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    /// One-based page number outside the document
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    OutOfRange { page: i64, page_count: usize },

    /// Pipeline step referenced an index not present at execution time
    #[error("Page index {index} does not exist (document has {page_count} pages)")]
    IndexOutOfBounds { index: usize, page_count: usize },

    /// Rotation delta that is not a multiple of 90
    #[error("Unsupported rotation angle {angle}: must be a multiple of 90")]
    UnsupportedAngle { angle: i64 },

    /// Applying passwords failed
    #[error("Encryption failed: {message}")]
    EncryptionFailure { message: String },

    /// Update feed could not be fetched
    #[error("Network failure for '{url}': {message}")]
    NetworkFailure { url: String, message: String },

    /// Update feed request exceeded its deadline
    #[error("Request to '{url}' timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Catch-all for the underlying document libraries (LoPDF, MuPDF, image)
    #[error("{backend} backend error: {message}")]
    Library {
        backend: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Serialisable tag naming the category of a [`ToolkitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidArguments,
    FileNotFound,
    InvalidFormat,
    OutOfRange,
    IndexOutOfBounds,
    UnsupportedAngle,
    EncryptionFailure,
    NetworkFailure,
    Timeout,
    Io,
    UnexpectedLibraryError,
}

impl ToolkitError {
    /// Returns the category tag reported alongside the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::UnsupportedAngle { .. } => ErrorKind::UnsupportedAngle,
            Self::EncryptionFailure { .. } => ErrorKind::EncryptionFailure,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io { .. } => ErrorKind::Io,
            Self::Library { .. } => ErrorKind::UnexpectedLibraryError,
        }
    }

    pub(crate) fn invalid_arguments(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_format(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn library(backend: &str, message: impl Into<String>) -> Self {
        Self::Library {
            backend: backend.to_string(),
            message: message.into(),
            source: None,
        }
    }
}

// Conversion implementations for common error types
impl From<io::Error> for ToolkitError {
    fn from(err: io::Error) -> Self {
        Self::Library {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<lopdf::Error> for ToolkitError {
    fn from(err: lopdf::Error) -> Self {
        Self::Library {
            backend: "LoPDF".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<mupdf::Error> for ToolkitError {
    fn from(err: mupdf::Error) -> Self {
        Self::Library {
            backend: "MuPDF".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for ToolkitError {
    fn from(err: image::ImageError) -> Self {
        Self::Library {
            backend: "image".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ToolkitError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat {
            input: "<json>".to_string(),
            reason: err.to_string(),
        }
    }
}
