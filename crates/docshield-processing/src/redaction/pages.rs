//! PDF page surgery for preview overlays and flattened pages.

use std::collections::BTreeMap;
use std::io::Write;

use docshield_core::models::{RedactionArea, RedactionStyle};
use docshield_core::AppError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::pdf::{self, PageBox};

const FONT_RESOURCE: &str = "DSHelv";
const IMAGE_RESOURCE: &str = "DSImg";
const PREVIEW_BANNER: &str = "REDACTION PREVIEW";
const PREVIEW_MARKER_KEY: &str = "DocShieldRedactionPreview";
const MAX_LABEL_FONT_SIZE: f32 = 12.0;
const MIN_LABEL_FONT_SIZE: f32 = 3.0;

/// Page-tree keys that may carry content a flattened page must not keep.
const FLATTENED_PAGE_DROPS: &[&[u8]] = &[
    b"Annots",
    b"Thumb",
    b"PieceInfo",
    b"Metadata",
    b"StructParents",
    b"B",
];

/// Catalog entries that can hold copies of page text or metadata.
const CATALOG_DROPS: &[&[u8]] = &[b"Metadata", b"StructTreeRoot", b"MarkInfo", b"AcroForm"];

pub(crate) type AreasByPage<'a> = BTreeMap<u32, Vec<&'a RedactionArea>>;

pub(crate) fn group_by_page(areas: &[RedactionArea]) -> AreasByPage<'_> {
    let mut grouped: AreasByPage<'_> = BTreeMap::new();
    for area in areas {
        grouped.entry(area.page).or_default().push(area);
    }
    grouped
}

/// Area in PDF user space: origin bottom-left, units in points.
fn area_rect(area: &RedactionArea, page: &PageBox) -> (f32, f32, f32, f32) {
    let width = area.width * page.width();
    let height = area.height * page.height();
    let x = page.llx + area.x * page.width();
    let y = page.lly + (1.0 - area.y - area.height) * page.height();
    (x as f32, y as f32, width as f32, height as f32)
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn color_operands(rgb: [u8; 3]) -> Vec<Object> {
    rgb.iter().map(|c| real(*c as f32 / 255.0)).collect()
}

/// Black on light fills, white on dark ones.
fn contrasting(rgb: [u8; 3]) -> [u8; 3] {
    let luminance = 0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32;
    if luminance > 128.0 {
        [0, 0, 0]
    } else {
        [255, 255, 255]
    }
}

fn encode_content(operations: Vec<Operation>) -> Result<Vec<u8>, AppError> {
    Content { operations }
        .encode()
        .map_err(|e| AppError::Internal(format!("Failed to encode content stream: {}", e)))
}

fn save(mut doc: Document) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| AppError::Internal(format!("Failed to write PDF: {}", e)))?;
    Ok(out)
}

fn page_dictionary_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, AppError> {
    doc.get_dictionary_mut(page_id)
        .map_err(|e| AppError::UnprocessableDocument(format!("Page object is not a dictionary: {}", e)))
}

/// Existing content stream references of a page, flattened out of any array.
fn content_refs(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(reference @ Object::Reference(_)) => match pdf::resolve(doc, reference) {
            Object::Array(items) => items.clone(),
            Object::Stream(_) => vec![reference.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Page resources with the preview font added, copied so shared resource
/// dictionaries on other pages are left alone.
fn resources_with_font(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = match pdf::inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(fonts) => match pdf::resolve(doc, fonts) {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, font_id);
    resources.set("Font", fonts);
    resources
}

fn text_operations(text: &str, x: f32, y: f32, size: f32, rgb: [u8; 3]) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("rg", color_operands(rgb)),
        Operation::new("Tf", vec![FONT_RESOURCE.into(), real(size)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn overlay_operations(
    areas: &[&RedactionArea],
    page: &PageBox,
    style: &RedactionStyle,
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];

    for area in areas {
        let (x, y, width, height) = area_rect(area, page);
        ops.push(Operation::new("rg", color_operands(style.fill_color)));
        ops.push(Operation::new(
            "re",
            vec![real(x), real(y), real(width), real(height)],
        ));
        ops.push(Operation::new("f", vec![]));

        if let Some(label) = &style.label {
            // Helvetica averages a little over half an em per glyph.
            let fit_width = (width - 4.0) / (label.len() as f32 * 0.6);
            let size = MAX_LABEL_FONT_SIZE.min(height * 0.7).min(fit_width);
            if size >= MIN_LABEL_FONT_SIZE {
                let baseline = y + (height - size) / 2.0 + size * 0.2;
                ops.extend(text_operations(
                    label,
                    x + 2.0,
                    baseline,
                    size,
                    contrasting(style.fill_color),
                ));
            }
        }
    }

    ops.extend(text_operations(
        PREVIEW_BANNER,
        (page.llx + 8.0) as f32,
        (page.ury - 16.0) as f32,
        10.0,
        [200, 0, 0],
    ));
    ops.push(Operation::new("Q", vec![]));
    ops
}

fn mark_preview(doc: &mut Document) {
    let info_id = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok();
    if let Some(info) = info_id.and_then(|id| doc.get_dictionary_mut(id).ok()) {
        info.set(PREVIEW_MARKER_KEY, Object::string_literal("true"));
        return;
    }
    let info_id = doc.add_object(dictionary! {
        PREVIEW_MARKER_KEY => Object::string_literal("true"),
    });
    doc.trailer.set("Info", info_id);
}

/// Draw opaque boxes over the original page content. The original content
/// streams stay in the file untouched.
pub(crate) fn preview(
    mut doc: Document,
    areas: &AreasByPage<'_>,
    style: &RedactionStyle,
) -> Result<Vec<u8>, AppError> {
    let page_ids = pdf::page_ids(&doc);
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    for (index, page_areas) in areas {
        let page_id = page_ids[*index as usize];
        let page = pdf::page_box(&doc, page_id);
        let resources = resources_with_font(&doc, page_id, font_id);
        let original = content_refs(&doc, page_id);

        // Streams are concatenated when the page is drawn; the leading
        // newline keeps the last original operator from fusing with `Q`.
        let mut overlay = b"\n".to_vec();
        overlay.extend(encode_content(overlay_operations(page_areas, &page, style))?);
        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(dictionary! {}, overlay));

        let mut contents = Vec::with_capacity(original.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(original);
        contents.push(Object::Reference(close_id));

        let page_dict = page_dictionary_mut(&mut doc, page_id)?;
        page_dict.set("Contents", contents);
        page_dict.set("Resources", resources);
    }

    mark_preview(&mut doc);
    save(doc)
}

fn compress(data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AppError::Internal(format!("Failed to compress page image: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| AppError::Internal(format!("Failed to compress page image: {}", e)))
}

/// Replace a page's drawing with a single image covering its MediaBox.
///
/// `image` must already be in unrotated page orientation. Everything the page
/// referenced before (content streams, fonts, annotations) is detached.
pub(crate) fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    page: &PageBox,
    image: &RgbImage,
) -> Result<(), AppError> {
    let (width_px, height_px) = image.dimensions();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compress(image.as_raw())?,
    ));

    let draw = encode_content(vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(page.width() as f32),
                real(0.0),
                real(0.0),
                real(page.height() as f32),
                real(page.llx as f32),
                real(page.lly as f32),
            ],
        ),
        Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
        Operation::new("Q", vec![]),
    ])?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, draw));

    let page_dict = page_dictionary_mut(doc, page_id)?;
    page_dict.set("Contents", content_id);
    page_dict.set(
        "Resources",
        dictionary! { "XObject" => dictionary! { IMAGE_RESOURCE => image_id } },
    );
    page_dict.set(
        "MediaBox",
        vec![
            real(page.llx as f32),
            real(page.lly as f32),
            real(page.urx as f32),
            real(page.ury as f32),
        ],
    );
    for key in FLATTENED_PAGE_DROPS {
        page_dict.remove(key);
    }
    Ok(())
}

/// Remove document-level metadata, drop unreachable objects and write a
/// fresh file with no incremental sections.
pub(crate) fn finish_permanent(mut doc: Document) -> Result<Vec<u8>, AppError> {
    doc.trailer.remove(b"Info");
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| AppError::UnprocessableDocument(format!("Document has no catalog: {}", e)))?;
    if let Ok(catalog) = doc.get_dictionary_mut(catalog_id) {
        for key in CATALOG_DROPS {
            catalog.remove(key);
        }
    }

    let pruned = doc.prune_objects();
    tracing::debug!(pruned_objects = pruned.len(), "Pruned unreachable objects");
    save(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_rect_flips_y_axis() {
        let page = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 200.0,
            ury: 100.0,
        };
        let area = RedactionArea::new(0, 0.25, 0.1, 0.5, 0.2);
        let (x, y, w, h) = area_rect(&area, &page);
        assert_eq!(x, 50.0);
        assert!((y - 70.0).abs() < 1e-4);
        assert_eq!(w, 100.0);
        assert!((h - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_area_rect_honors_media_box_origin() {
        let page = PageBox {
            llx: 10.0,
            lly: 20.0,
            urx: 110.0,
            ury: 220.0,
        };
        let area = RedactionArea::new(0, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(area_rect(&area, &page), (10.0, 20.0, 100.0, 200.0));
    }

    #[test]
    fn test_contrasting_label_color() {
        assert_eq!(contrasting([0, 0, 0]), [255, 255, 255]);
        assert_eq!(contrasting([255, 255, 0]), [0, 0, 0]);
    }

    #[test]
    fn test_group_by_page_keeps_order() {
        let areas = vec![
            RedactionArea::new(2, 0.0, 0.0, 0.1, 0.1),
            RedactionArea::new(0, 0.0, 0.0, 0.1, 0.1),
            RedactionArea::new(2, 0.5, 0.5, 0.1, 0.1),
        ];
        let grouped = group_by_page(&areas);
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(grouped[&2].len(), 2);
        assert_eq!(grouped[&2][1].x, 0.5);
    }
}
