//! Stacking an overlay PDF on top of a base PDF with lopdf.
//!
//! Overlay page N is drawn over base page N. The base content is wrapped in
//! `q … Q` so graphics state it leaves behind cannot leak into the overlay,
//! and the overlay's resources are merged into the base page's resources.
//! Resource names that collide with the base are renamed in the overlay
//! content.

use std::collections::{BTreeMap, HashSet};

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::traits::DocumentMerger;

/// Max Parent hops when looking for inherited resources.
const MAX_INHERIT_DEPTH: usize = 10;

/// [`DocumentMerger`] implemented in-process with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfMerger;

impl LopdfMerger {
    pub const fn new() -> Self {
        Self
    }
}

impl DocumentMerger for LopdfMerger {
    fn merge(&self, overlay: &[u8], base: &[u8]) -> Result<Vec<u8>> {
        let mut base = Document::load_mem(base)
            .map_err(|e| Error::PdfMerge(format!("Failed to load base PDF: {e}")))?;
        let mut overlay = Document::load_mem(overlay)
            .map_err(|e| Error::PdfMerge(format!("Failed to load overlay PDF: {e}")))?;

        overlay.renumber_objects_with(base.max_id + 1);

        let base_pages = base.get_pages();
        let overlay_pages = overlay.get_pages();
        if overlay_pages.len() != base_pages.len() {
            warn!(
                "Overlay has {} page(s), base has {}; extra pages are ignored",
                overlay_pages.len(),
                base_pages.len()
            );
        }

        // Collect per-page overlay content and resources before moving objects
        let mut page_layers = Vec::with_capacity(overlay_pages.len());
        let mut overlay_content_ids = HashSet::new();
        for (number, &overlay_page_id) in &overlay_pages {
            let Some(&base_page_id) = base_pages.get(number) else {
                continue;
            };
            let content = overlay
                .get_page_content(overlay_page_id)
                .map_err(|e| Error::PdfMerge(format!("Failed to read overlay page {number}: {e}")))?;
            overlay_content_ids.extend(overlay.get_page_contents(overlay_page_id));
            let resources = resolve_resources(&overlay, overlay_page_id)?;
            page_layers.push((base_page_id, content, resources));
        }

        for (id, object) in std::mem::take(&mut overlay.objects) {
            if overlay_content_ids.contains(&id) {
                continue;
            }
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    base.objects.insert(id, object);
                }
            }
        }
        base.max_id = base.max_id.max(overlay.max_id);

        let save_id = base.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = base.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

        for (base_page_id, content, overlay_resources) in page_layers {
            let mut resources = resolve_resources(&base, base_page_id)?;
            let renames = merge_resources(&base, &mut resources, &overlay_resources);
            let content = rename_operands(content, &renames)?;

            let layer_id = base.add_object(Stream::new(Dictionary::new(), content));
            let mut contents = vec![Object::Reference(save_id)];
            contents.extend(
                base.get_page_contents(base_page_id)
                    .into_iter()
                    .map(Object::Reference),
            );
            contents.push(Object::Reference(restore_id));
            contents.push(Object::Reference(layer_id));

            let page = base
                .get_object_mut(base_page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| Error::PdfMerge(format!("Failed to get page: {e}")))?;
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Dictionary(resources));
        }

        base.compress();
        let mut output = Vec::new();
        base.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save merged PDF: {e}")))?;
        debug!("Merged overlay into {} page(s)", base_pages.len());
        Ok(output)
    }
}

/// Merge each resource category of `overlay` into `base`.
///
/// Returns the names that had to be renamed because the base already uses
/// them for something else.
fn merge_resources(
    doc: &Document,
    base: &mut Dictionary,
    overlay: &Dictionary,
) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut renames = BTreeMap::new();

    for (category, entries) in overlay {
        let Some(entries) = resolve_dict_object(doc, entries) else {
            // ProcSet and other non-dictionary entries
            if !base.has(category) {
                base.set(category.clone(), entries.clone());
            }
            continue;
        };

        let mut merged = base
            .get(category)
            .ok()
            .and_then(|existing| resolve_dict_object(doc, existing))
            .unwrap_or_default();

        for (name, value) in &entries {
            let mut target = name.clone();
            let mut suffix = 1u32;
            while merged.get(&target).is_ok_and(|existing| existing != value) {
                target = [name.as_slice(), format!("_{suffix}").as_bytes()].concat();
                suffix += 1;
            }
            if &target != name {
                renames.insert(name.clone(), target.clone());
            }
            merged.set(target, value.clone());
        }

        base.set(category.clone(), Object::Dictionary(merged));
    }

    renames
}

/// Rewrite name operands in a content stream.
fn rename_operands(content: Vec<u8>, renames: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<Vec<u8>> {
    if renames.is_empty() {
        return Ok(content);
    }
    let mut decoded = Content::decode(&content)
        .map_err(|e| Error::PdfMerge(format!("Failed to decode overlay content: {e}")))?;
    for operation in &mut decoded.operations {
        for operand in &mut operation.operands {
            if let Object::Name(name) = operand
                && let Some(new_name) = renames.get(name.as_slice())
            {
                name.clone_from(new_name);
            }
        }
    }
    decoded
        .encode()
        .map_err(|e| Error::PdfMerge(format!("Failed to encode overlay content: {e}")))
}

/// Resolve the Resources dictionary for a page, handling indirect references
/// and inheritance from parent Pages nodes.
///
/// PDF pages can have Resources as:
/// - An inline dictionary: `/Resources << /Font << ... >> >>`
/// - An indirect reference: `/Resources 5 0 R`
/// - Inherited from parent Pages node
fn resolve_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Ok(res_obj) = page.get(b"Resources")
        && let Some(dict) = resolve_dict_object(doc, res_obj)
    {
        return Ok(dict);
    }

    let mut parent = page.get(b"Parent").ok();
    for _ in 0..MAX_INHERIT_DEPTH {
        let Some(Object::Reference(parent_id)) = parent else {
            break;
        };
        let Ok(node) = doc.get_dictionary(*parent_id) else {
            break;
        };
        if let Ok(res_obj) = node.get(b"Resources")
            && let Some(dict) = resolve_dict_object(doc, res_obj)
        {
            return Ok(dict);
        }
        parent = node.get(b"Parent").ok();
    }

    Ok(Dictionary::new())
}

/// Resolve an object that should be a Dictionary (handles References).
fn resolve_dict_object(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(ref_id) => doc.get_dictionary(*ref_id).ok().cloned(),
        _ => None,
    }
}
