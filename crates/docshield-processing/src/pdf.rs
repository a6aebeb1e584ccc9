//! PDF object-graph helpers shared by the validator and the redaction engine.

use docshield_core::AppError;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

/// US Letter, used when a page carries no usable MediaBox
const DEFAULT_MEDIA_BOX: PageBox = PageBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

static NULL_OBJECT: Object = Object::Null;

/// Bound on Parent-chain and reference walks; malformed files can form cycles.
const MAX_WALK_DEPTH: usize = 32;

/// A page's MediaBox in PDF user-space points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

/// Text recovered from one page's content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    /// 0-based page index
    pub page: u32,
    pub text: String,
}

pub(crate) fn load(data: &[u8]) -> Result<Document, AppError> {
    Document::load_mem(data)
        .map_err(|e| AppError::UnprocessableDocument(format!("Failed to parse PDF: {}", e)))
}

pub(crate) fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.get(b"Encrypt").is_ok()
}

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_WALK_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return &NULL_OBJECT,
            },
            _ => return current,
        }
    }
    &NULL_OBJECT
}

pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys
/// (MediaBox, Resources, Rotate, CropBox).
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_WALK_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().map(|v| number(resolve(doc, v))).collect::<Option<Vec<_>>>())
        .flatten();

    match values.as_deref() {
        Some([a, b, c, d]) => {
            let page = PageBox {
                llx: a.min(*c),
                lly: b.min(*d),
                urx: a.max(*c),
                ury: b.max(*d),
            };
            if page.width() > 0.0 && page.height() > 0.0 {
                page
            } else {
                DEFAULT_MEDIA_BOX
            }
        }
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Page rotation normalized to 0, 90, 180 or 270 degrees clockwise.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let raw = inherited(doc, page_id, b"Rotate")
        .and_then(number)
        .map(|r| r as i64)
        .unwrap_or(0);
    let normalized = raw.rem_euclid(360);
    match normalized {
        90 | 180 | 270 => normalized as u16,
        _ => 0,
    }
}

/// Page ids in document order (index 0 is the first page).
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Recover the string operands of text-showing operators, page by page.
///
/// This reads the content streams structurally; it does not render, so text
/// that only exists as pixels (such as a rasterized page) yields nothing.
pub fn extract_text(data: &[u8]) -> Result<Vec<PageText>, AppError> {
    let doc = load(data)?;
    let mut pages = Vec::new();

    for (index, page_id) in page_ids(&doc).into_iter().enumerate() {
        let content = doc.get_page_content(page_id).map_err(|e| {
            AppError::UnprocessableDocument(format!(
                "Failed to read content of page {}: {}",
                index, e
            ))
        })?;
        let text = if content.is_empty() {
            String::new()
        } else {
            let decoded = Content::decode(&content).map_err(|e| {
                AppError::UnprocessableDocument(format!(
                    "Failed to decode content of page {}: {}",
                    index, e
                ))
            })?;
            text_from_operations(&decoded)
        };
        pages.push(PageText {
            page: index as u32,
            text,
        });
    }

    Ok(pages)
}

fn text_from_operations(content: &Content) -> String {
    let mut out = String::new();
    for operation in &content.operations {
        let shown: Vec<&[u8]> = match operation.operator.as_str() {
            "Tj" | "'" | "\"" => operation
                .operands
                .last()
                .and_then(|o| match o {
                    Object::String(bytes, _) => Some(vec![bytes.as_slice()]),
                    _ => None,
                })
                .unwrap_or_default(),
            "TJ" => operation
                .operands
                .first()
                .and_then(|o| o.as_array().ok())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(bytes.as_slice()),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            "T*" | "Td" | "TD" | "ET" => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                continue;
            }
            _ => continue,
        };
        for bytes in shown {
            // Simple fonts use single-byte codes; Latin-1 is a close enough reading.
            out.extend(bytes.iter().map(|b| *b as char));
        }
    }
    out.trim_end().to_string()
}
