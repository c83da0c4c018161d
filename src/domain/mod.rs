//! Domain models for page selection, rotation and operation options.
//!
//! Everything here is pure: values are parsed from user input, validated,
//! and handed to the pipeline or an operation without touching any file.

pub mod options;
pub mod page_spec;
pub mod rotation;

pub use options::{TextColor, TextReplacement, WatermarkOptions, WatermarkOrientation, WatermarkSize};
pub use page_spec::{parse_page_spec, OutOfRangePolicy, PageIndexSet, PageSpec, PageToken};
pub use rotation::{Rotation, RotationMap};
