//! PDF toolkit: page selection, page transforms and document operations.
//!
//! Every operation (merge, split, organize, rotate, compress, watermark,
//! protect, image conversion, preview, text editing, update check) produces
//! exactly one [`OperationResult`], so front ends only ever have to parse a
//! single JSON object. Failures are reported in-band with a tagged
//! [`ErrorKind`].
//!
//! # Architecture
//!
//! - [`domain`]: page specifications, rotation maps and option payloads
//! - [`pipeline`]: in-memory page transforms over `lopdf` documents
//! - [`operations`]: the operation runner and the MuPDF-backed engine
//! - [`update`]: version comparison against a remote feed
//! - [`config`]: settings shared by every operation of a run
//! - [`error`]: error categories
//!
//! # Quick Start
//!
//! ```no_run
//! use pdf_toolkit::{Operation, OperationRunner, RunnerConfig};
//! use std::path::PathBuf;
//!
//! let runner = OperationRunner::with_mupdf(RunnerConfig::default());
//! let result = runner.run(Operation::Split {
//!     input: PathBuf::from("report.pdf"),
//!     pages: "3,1-2".to_string(),
//!     output: PathBuf::from("reordered.pdf"),
//! });
//! println!("{}", result.to_json());
//! ```
//!
//! ## Page Selection
//!
//! ```
//! use pdf_toolkit::domain::{parse_page_spec, OutOfRangePolicy};
//!
//! let pages = parse_page_spec("2,1,2", 3, OutOfRangePolicy::Reject).unwrap();
//! assert_eq!(pages.as_slice(), &[1, 0]);
//! ```

// Public API
pub mod config;
pub mod domain;
pub mod error;
pub mod operations;
pub mod pipeline;
pub mod update;

// Re-exports for convenient access
pub use config::{EncryptionStrength, RunnerConfig};
pub use domain::{parse_page_spec, OutOfRangePolicy, PageIndexSet, PageSpec, Rotation, RotationMap};
pub use error::{ErrorKind, ToolkitError, ToolkitResult};
pub use operations::{DocumentEngine, MupdfEngine, Operation, OperationResult, OperationRunner};
pub use pipeline::{PageStep, TransformPipeline};
pub use update::{AppVersion, UpdateChecker, UpdateConfig, UpdateStatus};
