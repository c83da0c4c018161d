//! Operation runner and the individual operations.
//!
//! Every operation validates its arguments, does its work through the
//! transform pipeline or a [`DocumentEngine`], and reports a single
//! [`OperationResult`]. Errors never escape [`OperationRunner::run`].

pub mod convert;
pub mod document_ops;
pub mod edit_text;
pub mod engine;
pub mod mupdf_engine;
pub mod overlay;
pub mod page_ops;
pub mod result;

pub use engine::{DocumentEngine, RenderJob, TextHit, TextSpan, TextTarget};
pub use mupdf_engine::MupdfEngine;
pub use result::OperationResult;

use crate::config::RunnerConfig;
use crate::error::{ToolkitError, ToolkitResult};
use crate::update::{UpdateChecker, DEFAULT_TIMEOUT};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A fully parsed request for one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge {
        /// JSON array of input paths
        inputs: String,
        output: PathBuf,
    },
    Split {
        input: PathBuf,
        pages: String,
        output: PathBuf,
    },
    Organize {
        input: PathBuf,
        order: String,
        delete: String,
        output: PathBuf,
    },
    Rotate {
        input: PathBuf,
        /// JSON object mapping pages to angles
        rotations: String,
        output: PathBuf,
    },
    Compress {
        input: PathBuf,
        output: PathBuf,
    },
    Watermark {
        input: PathBuf,
        output: PathBuf,
        options: String,
    },
    Protect {
        input: PathBuf,
        output: PathBuf,
        password: String,
    },
    ImageToPdf {
        /// Comma-separated image paths
        images: String,
        output: PathBuf,
    },
    PdfToImage {
        input: PathBuf,
        output_dir: PathBuf,
    },
    Preview {
        input: PathBuf,
        /// Zero-based page, or `-1` for thumbnails of every page
        page: i64,
        output_dir: PathBuf,
    },
    CheckUpdate {
        url: String,
        current_version: String,
        timeout: Option<Duration>,
    },
    ExtractText {
        input: PathBuf,
    },
    ReplaceText {
        input: PathBuf,
        /// JSON array of replacements
        replacements: String,
        output: PathBuf,
    },
}

impl Operation {
    /// Command-line name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge { .. } => "merge",
            Self::Split { .. } => "split",
            Self::Organize { .. } => "organize",
            Self::Rotate { .. } => "rotate",
            Self::Compress { .. } => "compress",
            Self::Watermark { .. } => "watermark",
            Self::Protect { .. } => "protect",
            Self::ImageToPdf { .. } => "image-to-pdf",
            Self::PdfToImage { .. } => "pdf-to-image",
            Self::Preview { .. } => "preview",
            Self::CheckUpdate { .. } => "check-update",
            Self::ExtractText { .. } => "edit-text extract",
            Self::ReplaceText { .. } => "edit-text replace",
        }
    }
}

/// Runs operations with one configuration and one document engine.
pub struct OperationRunner {
    config: RunnerConfig,
    engine: Box<dyn DocumentEngine>,
}

impl Default for OperationRunner {
    fn default() -> Self {
        Self::with_mupdf(RunnerConfig::default())
    }
}

impl OperationRunner {
    /// Creates a runner with the specified engine.
    pub fn new(config: RunnerConfig, engine: Box<dyn DocumentEngine>) -> Self {
        Self { config, engine }
    }

    /// Creates a runner backed by MuPDF.
    pub fn with_mupdf(config: RunnerConfig) -> Self {
        Self::new(config, Box::new(MupdfEngine::new()))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Runs `operation` and converts any failure into a failed result.
    #[instrument(skip_all, fields(operation = operation.name()))]
    pub fn run(&self, operation: Operation) -> OperationResult {
        // Malformed documents can make the PDF libraries panic.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(operation)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ToolkitError::library("panic", message))
            });

        match outcome {
            Ok(result) => {
                info!(message = %result.message, "operation succeeded");
                result
            }
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "operation failed");
                OperationResult::failure(&e)
            }
        }
    }

    fn execute(&self, operation: Operation) -> ToolkitResult<OperationResult> {
        let engine = self.engine.as_ref();
        let config = &self.config;

        match operation {
            Operation::Merge { inputs, output } => page_ops::merge(&inputs, &output),
            Operation::Split {
                input,
                pages,
                output,
            } => page_ops::split(config, &input, &pages, &output),
            Operation::Organize {
                input,
                order,
                delete,
                output,
            } => page_ops::organize(config, &input, &order, &delete, &output),
            Operation::Rotate {
                input,
                rotations,
                output,
            } => page_ops::rotate(config, &input, &rotations, &output),
            Operation::Compress { input, output } => {
                document_ops::compress(engine, &input, &output)
            }
            Operation::Watermark {
                input,
                output,
                options,
            } => document_ops::watermark(&input, &output, &options),
            Operation::Protect {
                input,
                output,
                password,
            } => document_ops::protect(engine, config, &input, &output, &password),
            Operation::ImageToPdf { images, output } => convert::image_to_pdf(&images, &output),
            Operation::PdfToImage { input, output_dir } => {
                convert::pdf_to_image(engine, config, &input, &output_dir)
            }
            Operation::Preview {
                input,
                page,
                output_dir,
            } => convert::preview(engine, config, &input, page, &output_dir),
            Operation::CheckUpdate {
                url,
                current_version,
                timeout,
            } => {
                let checker = UpdateChecker::new(timeout.unwrap_or(DEFAULT_TIMEOUT));
                Ok(checker.check(&url, &current_version).into_result())
            }
            Operation::ExtractText { input } => edit_text::extract(engine, &input),
            Operation::ReplaceText {
                input,
                replacements,
                output,
            } => edit_text::replace(engine, config, &input, &replacements, &output),
        }
    }
}
