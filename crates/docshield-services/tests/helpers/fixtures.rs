//! Documents built in code.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

fn page_content(text: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap()
}

/// One page per entry, uncompressed, Letter size.
pub fn build_pdf(pages: &[&str], catalog_extra: Dictionary) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(text)));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }))
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    for (key, value) in catalog_extra.iter() {
        catalog.set(key.clone(), value.clone());
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn three_page_pdf() -> Vec<u8> {
    build_pdf(
        &["Page one SECRET", "Page two PUBLIC", "Page three SECRET"],
        Dictionary::new(),
    )
}

pub fn contact_pdf() -> Vec<u8> {
    build_pdf(
        &["Contact john@example.com or 555-123-4567", "Nothing here"],
        Dictionary::new(),
    )
}

pub fn javascript_pdf() -> Vec<u8> {
    build_pdf(
        &["Click me"],
        dictionary! {
            "OpenAction" => dictionary! {
                "S" => "JavaScript",
                "JS" => Object::string_literal("app.launchURL('http://example.com')"),
            },
        },
    )
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
