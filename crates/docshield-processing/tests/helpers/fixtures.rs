//! Test fixtures: PDFs and images built in code.

use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

fn text_page_content(text: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap()
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Build a document with one page per entry, with uncompressed content
/// streams so text is visible in the raw bytes. `catalog_extra` entries are
/// merged into the catalog.
pub fn build_pdf(
    pages: &[&str],
    rotate: Option<i64>,
    catalog_extra: impl FnOnce(&mut Document) -> Dictionary,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, text_page_content(text)));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if let Some(r) = rotate {
                page.set("Rotate", r);
            }
            let page_id: ObjectId = doc.add_object(page);
            page_id.into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    let extras = catalog_extra(&mut doc);
    for (key, value) in extras.iter() {
        catalog.set(key.clone(), value.clone());
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Quarterly report"),
    });
    doc.trailer.set("Info", info_id);
    save(doc)
}

pub fn no_extras(_: &mut Document) -> Dictionary {
    Dictionary::new()
}

/// Three pages; the first and last carry the word SECRET.
pub fn create_three_page_pdf() -> Vec<u8> {
    build_pdf(
        &["Page one SECRET", "Page two PUBLIC", "Page three SECRET"],
        None,
        no_extras,
    )
}

pub fn create_rotated_pdf() -> Vec<u8> {
    build_pdf(&["Rotated SECRET"], Some(90), no_extras)
}

pub fn create_pdf_with_javascript() -> Vec<u8> {
    build_pdf(&["Hello"], None, |_| {
        dictionary! {
            "OpenAction" => dictionary! {
                "S" => "JavaScript",
                "JS" => Object::string_literal("app.alert('hi')"),
            },
        }
    })
}

pub fn create_pdf_with_embedded_file() -> Vec<u8> {
    build_pdf(&["Attachment inside"], None, |doc| {
        let file_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "EmbeddedFile" },
            b"payload".to_vec(),
        ));
        let spec_id = doc.add_object(dictionary! {
            "Type" => "Filespec",
            "F" => Object::string_literal("payload.bin"),
            "EF" => dictionary! { "F" => file_id },
        });
        dictionary! {
            "Names" => dictionary! {
                "EmbeddedFiles" => dictionary! {
                    "Names" => vec![Object::string_literal("payload.bin"), spec_id.into()],
                },
            },
        }
    })
}

/// A document whose trailer declares encryption. The encryption dictionary
/// is not usable; only its presence matters.
pub fn create_encrypted_pdf() -> Vec<u8> {
    let mut doc = Document::load_mem(&create_three_page_pdf()).unwrap();
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "P" => -4,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    save(doc)
}

/// A PDF whose page tree has no pages.
pub fn create_empty_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    save(doc)
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}
