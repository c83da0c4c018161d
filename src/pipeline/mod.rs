//! Document transform pipeline.
//!
//! A [`TransformPipeline`] is an ordered list of [`PageStep`]s applied to an
//! in-memory copy of a source document. The caller keeps ownership of the
//! source; the pipeline never touches the disk. Use [`load_document`] and
//! [`save_document`] at the edges.

pub mod page_tree;

use crate::domain::{PageIndexSet, Rotation};
use crate::error::{ToolkitError, ToolkitResult};
use lopdf::{Document, ObjectId};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, instrument};

/// One transformation applied to the working page list.
#[derive(Debug, Clone)]
pub enum PageStep {
    /// Keep exactly these pages, in this order.
    Keep(PageIndexSet),

    /// Add `angle` degrees to the page currently at `index`.
    Rotate { index: usize, angle: i64 },

    /// Append every page of another document.
    Append(Document),
}

impl PageStep {
    fn label(&self) -> &'static str {
        match self {
            Self::Keep(_) => "keep",
            Self::Rotate { .. } => "rotate",
            Self::Append(_) => "append",
        }
    }
}

/// Ordered sequence of page steps.
///
/// Steps run in insertion order. Indices used by a `Rotate` step refer to
/// the page list as it stands when that step executes, so a `Keep` placed
/// earlier renumbers the pages seen by later rotations.
#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    steps: Vec<PageStep>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep(self, indices: PageIndexSet) -> Self {
        self.push(PageStep::Keep(indices))
    }

    pub fn rotate(self, index: usize, angle: i64) -> Self {
        self.push(PageStep::Rotate { index, angle })
    }

    pub fn append(self, other: Document) -> Self {
        self.push(PageStep::Append(other))
    }

    pub fn push(mut self, step: PageStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step against a copy of `source` and returns the result.
    ///
    /// # Errors
    ///
    /// - [`ToolkitError::IndexOutOfBounds`] if a step names a page that does
    ///   not exist when the step runs
    /// - [`ToolkitError::UnsupportedAngle`] if a rotation is not a multiple of 90
    /// - [`ToolkitError::Library`] if the page tree is malformed
    #[instrument(skip_all, fields(steps = self.steps.len()))]
    pub fn apply(self, source: &Document) -> ToolkitResult<Document> {
        let mut doc = source.clone();
        let (root, mut pages) = page_tree::flatten(&mut doc)?;

        for step in self.steps {
            debug!(step = step.label(), pages = pages.len(), "applying page step");
            match step {
                PageStep::Keep(indices) => {
                    pages = select_pages(&pages, &indices)?;
                }
                PageStep::Rotate { index, angle } => {
                    let delta = Rotation::from_degrees(angle)?;
                    let page_id = *pages.get(index).ok_or(ToolkitError::IndexOutOfBounds {
                        index,
                        page_count: pages.len(),
                    })?;
                    if !delta.is_none() {
                        page_tree::rotate(&mut doc, page_id, delta)?;
                    }
                }
                PageStep::Append(other) => {
                    pages.extend(absorb(&mut doc, other)?);
                }
            }
        }

        page_tree::write_kids(&mut doc, root, &pages)?;
        let pruned = doc.prune_objects();
        debug!(pages = pages.len(), pruned = pruned.len(), "pipeline finished");
        Ok(doc)
    }
}

fn select_pages(pages: &[ObjectId], indices: &PageIndexSet) -> ToolkitResult<Vec<ObjectId>> {
    indices
        .iter()
        .map(|index| {
            pages
                .get(index)
                .copied()
                .ok_or(ToolkitError::IndexOutOfBounds {
                    index,
                    page_count: pages.len(),
                })
        })
        .collect()
}

/// Moves every object of `other` into `doc` and returns its page ids.
///
/// Object ids of `other` are shifted past `doc`'s highest id first so the
/// two object tables never collide.
fn absorb(doc: &mut Document, mut other: Document) -> ToolkitResult<Vec<ObjectId>> {
    other.renumber_objects_with(doc.max_id + 1);
    let (_, pages) = page_tree::flatten(&mut other)?;

    let highest = other
        .objects
        .keys()
        .map(|(id, _)| *id)
        .max()
        .unwrap_or(other.max_id);
    doc.objects.extend(other.objects);
    doc.max_id = doc.max_id.max(highest);

    Ok(pages)
}

/// Opens a document from disk.
pub fn load_document(path: &Path) -> ToolkitResult<Document> {
    if !path.exists() {
        return Err(ToolkitError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let doc = Document::load(path)?;
    debug!(path = %path.display(), pages = doc.get_pages().len(), "loaded document");
    Ok(doc)
}

/// Writes a document to disk, replacing any existing file.
///
/// The bytes go to a staged file first, so `path` may name the document the
/// caller loaded from.
pub fn save_document(doc: &mut Document, path: &Path) -> ToolkitResult<()> {
    let staged = StagedOutput::new(path)?;
    doc.save(staged.path())
        .map_err(|e| ToolkitError::io(staged.path(), e))?;
    staged.commit()
}

/// Output written under a temporary name in the target's directory.
///
/// The target is replaced only by [`StagedOutput::commit`]. Until then an
/// input file that is also the target stays intact, and dropping the stage
/// removes the partial file.
#[derive(Debug)]
pub struct StagedOutput {
    temp: TempPath,
    target: PathBuf,
}

impl StagedOutput {
    pub fn new(target: &Path) -> ToolkitResult<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".pdf-toolkit-")
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(|e| ToolkitError::io(target, e))?
            .into_temp_path();

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Where writers should put the new bytes.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Moves the staged file over the target.
    pub fn commit(self) -> ToolkitResult<()> {
        let Self { temp, target } = self;
        temp.persist(&target)
            .map_err(|e| ToolkitError::io(&target, e.error))?;
        debug!(path = %target.display(), "saved document");
        Ok(())
    }
}
