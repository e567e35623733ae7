use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use log::warn;
use std::path::Path;

use crate::error::{Result, SealError};
use crate::overlay::{PAGE_HEIGHT_PT, PAGE_WIDTH_PT};

const STAMP_XOBJECT_NAME: &str = "SealStamp";
// Guards against cyclic Parent links in malformed page trees.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampOutcome {
    pub page_count: usize,
    /// `None` when the target index was past the last page.
    pub stamped_page: Option<usize>,
}

/// Merges the first page of `overlay_path` on top of page `target_page`
/// (0-based) of `source_path` and writes the result to `output_path`.
///
/// Every page is kept, in order. A target index past the end is not an
/// error: the copy is written without a stamp.
pub fn apply_stamp(
    source_path: &Path,
    overlay_path: &Path,
    output_path: &Path,
    target_page: usize,
) -> Result<StampOutcome> {
    let mut doc = Document::load(source_path)?;
    let overlay = Document::load(overlay_path)?;

    let outcome = stamp_document(&mut doc, overlay, overlay_path, target_page)?;
    if outcome.stamped_page.is_none() {
        warn!(
            "{} has {} page(s), page index {} does not exist; copied without stamp",
            source_path.display(),
            outcome.page_count,
            target_page
        );
    }

    doc.save(output_path)?;
    Ok(outcome)
}

/// In-memory form of [`apply_stamp`]. `overlay_path` only names the overlay
/// in errors.
pub fn stamp_document(
    doc: &mut Document,
    overlay: Document,
    overlay_path: &Path,
    target_page: usize,
) -> Result<StampOutcome> {
    if overlay.get_pages().is_empty() {
        return Err(SealError::EmptyOverlay(overlay_path.to_path_buf()));
    }

    let pages = doc.get_pages();
    let page_count = pages.len();
    let Some(&page_id) = pages.values().nth(target_page) else {
        return Ok(StampOutcome { page_count, stamped_page: None });
    };

    let form_id = import_page_as_form(doc, overlay, overlay_path)?;
    paint_form_on_page(doc, page_id, form_id)?;

    Ok(StampOutcome { page_count, stamped_page: Some(target_page) })
}

/// Moves the overlay's objects into `doc` and wraps its first page in a
/// form XObject so it can be drawn on any page with a single `Do`.
fn import_page_as_form(doc: &mut Document, mut overlay: Document, overlay_path: &Path) -> Result<ObjectId> {
    overlay.renumber_objects_with(doc.max_id + 1);

    let page_id = *overlay
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| SealError::EmptyOverlay(overlay_path.to_path_buf()))?;

    let content = overlay.get_page_content(page_id)?;
    let resources = inherited_attribute(&overlay, page_id, b"Resources");
    let bbox = inherited_attribute(&overlay, page_id, b"MediaBox").unwrap_or_else(|| {
        Object::Array(vec![0.into(), 0.into(), PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into()])
    });
    let page_streams = overlay.get_page_contents(page_id);

    let overlay_max = overlay.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    doc.max_id = doc.max_id.max(overlay_max);

    for (id, object) in overlay.objects {
        if page_streams.contains(&id) {
            continue;
        }
        match object.type_name().unwrap_or("") {
            "Catalog" | "Pages" | "Page" => {}
            _ => {
                doc.objects.insert(id, object);
            }
        }
    }

    let mut form = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => bbox,
    };
    if let Some(resources) = resources {
        form.set("Resources", resources);
    }
    Ok(doc.add_object(Stream::new(form, content)))
}

/// Registers the form in the page's resources and draws it after the
/// existing content. The original content is wrapped in `q`/`Q` so its
/// graphics state cannot leak into the stamp.
fn paint_form_on_page(doc: &mut Document, page_id: ObjectId, form_id: ObjectId) -> Result<()> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };

    let name = unused_name(&xobjects);
    xobjects.set(name.clone(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut contents = Vec::new();
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    contents.push(Object::Reference(open_id));

    match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(streams)) => contents.extend(streams.iter().cloned()),
            _ => contents.push(Object::Reference(*id)),
        },
        Ok(Object::Array(streams)) => contents.extend(streams.iter().cloned()),
        _ => {}
    }

    let close = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    };
    let close_id = doc.add_object(Stream::new(dictionary! {}, close.encode()?));
    contents.push(Object::Reference(close_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn unused_name(xobjects: &Dictionary) -> String {
    let mut name = STAMP_XOBJECT_NAME.to_string();
    let mut n = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{STAMP_XOBJECT_NAME}{n}");
        n += 1;
    }
    name
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
/// Indirect values are resolved.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}
