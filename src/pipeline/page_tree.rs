//! Page tree helpers over `lopdf` documents.
//!
//! The pipeline works on a flat page list: every page hangs directly off the
//! root `/Pages` node and carries its own copy of the inheritable attributes.
//! Intermediate nodes left behind are dropped when the document is pruned.

use crate::domain::Rotation;
use crate::error::{ToolkitError, ToolkitResult};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Returns the object id of the root `/Pages` node.
pub fn root_pages_id(doc: &Document) -> ToolkitResult<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| ToolkitError::library("LoPDF", format!("missing page tree root: {}", e)))
}

/// Page object ids in document order.
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Hoists every page directly under the root node.
///
/// Returns the root id and the page ids in document order.
pub fn flatten(doc: &mut Document) -> ToolkitResult<(ObjectId, Vec<ObjectId>)> {
    let root = root_pages_id(doc)?;
    let pages = page_ids(doc);

    for &page_id in &pages {
        let inherited = collect_inherited(doc, page_id)?;
        if inherited.is_empty() {
            continue;
        }
        let page = doc.get_dictionary_mut(page_id)?;
        for (key, value) in inherited {
            page.set(key, value);
        }
    }

    write_kids(doc, root, &pages)?;
    Ok((root, pages))
}

/// Values of inheritable attributes the page lacks but an ancestor defines.
fn collect_inherited(doc: &Document, page_id: ObjectId) -> ToolkitResult<Vec<(Vec<u8>, Object)>> {
    let page = doc.get_dictionary(page_id)?;
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut visited = HashSet::from([page_id]);
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(node_id) = parent {
        if missing.is_empty() || !visited.insert(node_id) {
            break;
        }
        let node = doc.get_dictionary(node_id)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(found)
}

/// Rewrites the root node's `/Kids` and `/Count` and re-parents every page.
pub fn write_kids(doc: &mut Document, root: ObjectId, pages: &[ObjectId]) -> ToolkitResult<()> {
    {
        let root_dict = doc.get_dictionary_mut(root)?;
        root_dict.set(
            "Kids",
            Object::Array(pages.iter().map(|id| Object::Reference(*id)).collect()),
        );
        root_dict.set("Count", Object::Integer(pages.len() as i64));
    }

    for &page_id in pages {
        doc.get_dictionary_mut(page_id)?
            .set("Parent", Object::Reference(root));
    }
    Ok(())
}

/// Current `/Rotate` of a page, normalised. Malformed values count as none.
pub fn rotation_of(doc: &Document, page_id: ObjectId) -> ToolkitResult<Rotation> {
    let page = doc.get_dictionary(page_id)?;
    Ok(page
        .get(b"Rotate")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|degrees| Rotation::from_degrees(degrees).ok())
        .unwrap_or(Rotation::NONE))
}

/// Adds `delta` to the page's existing rotation.
pub fn rotate(doc: &mut Document, page_id: ObjectId, delta: Rotation) -> ToolkitResult<Rotation> {
    let updated = rotation_of(doc, page_id)?.add(delta);
    doc.get_dictionary_mut(page_id)?
        .set("Rotate", Object::Integer(i64::from(updated.degrees())));
    Ok(updated)
}

/// Visible page rectangle `[x0, y0, x1, y1]` in points.
///
/// `/CropBox` wins over `/MediaBox`; inherited boxes count. Pages without
/// any box are treated as US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> ToolkitResult<[f32; 4]> {
    let page = doc.get_dictionary(page_id)?;
    let inherited = collect_inherited(doc, page_id)?;
    let boxes = [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .filter_map(|key| {
            page.get(key)
                .ok()
                .or_else(|| inherited.iter().find(|(k, _)| k == key).map(|(_, v)| v))
        });

    for object in boxes {
        let array = match object {
            Object::Reference(id) => doc.get_object(*id)?.as_array()?,
            other => other.as_array()?,
        };
        let numbers: Vec<f32> = array.iter().filter_map(number).collect();
        if let [x0, y0, x1, y1] = numbers.as_slice() {
            return Ok([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]);
        }
    }

    Ok([0.0, 0.0, 612.0, 792.0])
}

/// Page width and height in points.
pub fn page_size(doc: &Document, page_id: ObjectId) -> ToolkitResult<(f32, f32)> {
    let [x0, y0, x1, y1] = page_box(doc, page_id)?;
    Ok((x1 - x0, y1 - y0))
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// A document with an empty page tree.
pub fn blank_document() -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(vec![]));
    pages.set("Count", Object::Integer(0));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}
