//! Page-level PDF surgery on top of `lopdf`: load, cut a page range out, and
//! concatenate documents in order.

use crate::{chunk_plan::PageRange, util::write_atomic};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeSet;
use std::path::Path;

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

pub fn load(path: &Path) -> lopdf::Result<Document> {
    Document::load(path)
}

pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

/// A copy of `doc` holding only the pages in the zero-based `range`.
pub fn extract_range(doc: &Document, range: PageRange) -> Document {
    let mut part = doc.clone();
    let drop: Vec<u32> = part
        .get_pages()
        .keys()
        .copied()
        .filter(|&n| !range.contains(n - 1))
        .collect();
    if !drop.is_empty() {
        part.delete_pages(&drop);
    }
    part.prune_objects();
    part
}

/// Appends the pages of `docs` in order into a fresh document.
///
/// Catalogs, page tree nodes and outlines of the inputs are dropped; inherited
/// page attributes are copied onto each page first so nothing is lost with them.
pub fn concatenate(docs: Vec<Document>) -> lopdf::Result<Document> {
    let mut out = Document::with_version("1.5");
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for mut doc in docs {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &id in &page_ids {
            pages.push((id, page_with_inherited(&doc, id)?));
        }
        let page_set: BTreeSet<ObjectId> = page_ids.into_iter().collect();

        for (id, object) in doc.objects {
            if page_set.contains(&id) {
                continue;
            }
            match type_name(&object) {
                Some(b"Catalog" | b"Pages" | b"Outlines" | b"Outline") => {}
                _ => {
                    out.objects.insert(id, object);
                }
            }
        }
    }

    out.max_id = next_id.saturating_sub(1);
    let pages_id = out.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        out.objects.insert(id, Object::Dictionary(page));
        kids.push(Object::Reference(id));
    }
    let count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);
    out.prune_objects();
    out.renumber_objects();
    Ok(out)
}

/// Saves through a temp file + rename; an interrupted save leaves no file at `path`.
pub fn save_atomic(doc: &mut Document, path: &Path) -> std::io::Result<()> {
    write_atomic(path, |file| {
        doc.save_to(file)
            .map_err(|e| std::io::Error::other(e.to_string()))
    })
}

fn page_with_inherited(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = doc.get_object(page_id)?.as_dict()?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_object(node_id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(page)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}
