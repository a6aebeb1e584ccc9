//! Structural inspection of untrusted document bytes.
//!
//! Two passes look for risk signals. A raw token sweep reads every PDF name in
//! the file, so markers survive a broken cross-reference table. A sweep over
//! the parsed object graph sees inside compressed object streams. A signal
//! found by either pass counts. Nothing is executed or rendered.

use std::collections::BTreeSet;
use std::io::Cursor;

use docshield_core::models::{DocumentFormat, ValidationReport};
use image::ImageReader;
use lopdf::{Document, Object};

const JAVASCRIPT_NAMES: &[&[u8]] = &[b"JavaScript", b"JS"];
const EMBEDDED_NAMES: &[&[u8]] = &[b"EmbeddedFile", b"EmbeddedFiles", b"RichMedia"];

/// Names that are not blocking on their own but deserve a warning.
const WARNING_NAMES: &[(&[u8], &str)] = &[
    (b"OpenAction", "Document runs an action when opened (/OpenAction)"),
    (b"AA", "Document defines additional actions (/AA)"),
    (b"Launch", "Document can launch external applications (/Launch)"),
    (b"XFA", "Document contains an XFA form (/XFA)"),
    (b"SubmitForm", "Document can submit form data (/SubmitForm)"),
];

#[derive(Debug, Default)]
struct Signals {
    encrypted: bool,
    javascript: bool,
    embedded_files: bool,
    warnings: BTreeSet<&'static str>,
}

impl Signals {
    fn observe(&mut self, name: &[u8]) {
        if name == b"Encrypt" {
            self.encrypted = true;
        } else if JAVASCRIPT_NAMES.contains(&name) {
            self.javascript = true;
        } else if EMBEDDED_NAMES.contains(&name) {
            self.embedded_files = true;
        } else if let Some((_, warning)) = WARNING_NAMES.iter().find(|(n, _)| *n == name) {
            self.warnings.insert(*warning);
        }
    }
}

/// Parses only the structural envelope of PDF, PNG and JPEG input.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }

    /// Inspect `data` and report what it is and which risk markers it carries.
    ///
    /// Never fails: unparseable input yields `valid = false` with an error.
    pub fn validate(&self, data: &[u8]) -> ValidationReport {
        let format = DocumentFormat::sniff(data);
        let report = match format {
            DocumentFormat::Pdf => validate_pdf(data),
            DocumentFormat::Png | DocumentFormat::Jpeg => validate_raster(data, format),
            DocumentFormat::Unknown => {
                ValidationReport::invalid(format, "Unrecognized document format")
            }
        };

        tracing::debug!(
            format = %report.format,
            valid = report.valid,
            is_encrypted = report.is_encrypted,
            has_javascript = report.has_javascript,
            has_embedded_files = report.has_embedded_files,
            warnings = report.warnings.len(),
            "Structural validation complete"
        );
        report
    }

    /// Like `validate`, and additionally flags a declared MIME type that
    /// disagrees with the format detected from the bytes.
    pub fn validate_declared(&self, data: &[u8], declared_mime: &str) -> ValidationReport {
        let mut report = self.validate(data);
        let declared = DocumentFormat::from_mime(declared_mime);
        if declared != report.format {
            report.valid = false;
            report.errors.push(format!(
                "Declared content type '{}' does not match detected format '{}'",
                declared_mime, report.format
            ));
        }
        report
    }
}

fn validate_pdf(data: &[u8]) -> ValidationReport {
    let mut report = ValidationReport::empty(DocumentFormat::Pdf);
    let mut signals = Signals::default();
    sweep_raw_names(data, &mut signals);
    report.version = header_version(data);

    let eof_markers = count_occurrences(data, b"%%EOF");
    if eof_markers > 1 {
        report.warnings.push(format!(
            "Document has {} incremental updates",
            eof_markers - 1
        ));
    }

    match Document::load_mem(data) {
        Ok(doc) => {
            sweep_object_graph(&doc, &mut signals);
            if !doc.version.is_empty() {
                report.version = Some(doc.version.clone());
            }
            let pages = doc.get_pages().len() as u32;
            report.page_count = Some(pages);
            if pages == 0 {
                report.errors.push("Document has no pages".to_string());
            } else {
                report.valid = true;
            }
        }
        Err(e) => {
            report.errors.push(format!("Failed to parse PDF structure: {}", e));
        }
    }

    report.is_encrypted = signals.encrypted;
    report.has_javascript = signals.javascript;
    report.has_embedded_files = signals.embedded_files;
    report
        .warnings
        .extend(signals.warnings.into_iter().map(str::to_string));
    report
}

fn validate_raster(data: &[u8], format: DocumentFormat) -> ValidationReport {
    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => return ValidationReport::invalid(format, format!("Failed to read image: {}", e)),
    };

    match reader.into_dimensions() {
        Ok((width, height)) if width > 0 && height > 0 => {
            let mut report = ValidationReport::empty(format);
            report.valid = true;
            report.page_count = Some(1);
            report
        }
        Ok(_) => ValidationReport::invalid(format, "Image has zero dimensions"),
        Err(e) => ValidationReport::invalid(format, format!("Failed to decode image header: {}", e)),
    }
}

/// `%PDF-1.7` → `1.7`
fn header_version(data: &[u8]) -> Option<String> {
    let head = &data[..data.len().min(1024)];
    let start = head.windows(5).position(|w| w == b"%PDF-")? + 5;
    let version: String = head[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|b| *b as char)
        .collect();
    (!version.is_empty()).then_some(version)
}

fn count_occurrences(data: &[u8], needle: &[u8]) -> usize {
    data.windows(needle.len()).filter(|w| *w == needle).count()
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' '
            | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Read every `/Name` token in the raw bytes, decoding `#hh` escapes so
/// `/J#61vaScript` is seen as `/JavaScript`.
fn sweep_raw_names(data: &[u8], signals: &mut Signals) {
    let mut i = 0;
    let mut name = Vec::with_capacity(32);
    while i < data.len() {
        if data[i] != b'/' {
            i += 1;
            continue;
        }
        i += 1;
        name.clear();
        while i < data.len() && !is_delimiter(data[i]) {
            if data[i] == b'#' && i + 2 < data.len() {
                if let Some(decoded) = hex_pair(data[i + 1], data[i + 2]) {
                    name.push(decoded);
                    i += 3;
                    continue;
                }
            }
            name.push(data[i]);
            i += 1;
        }
        if !name.is_empty() {
            signals.observe(&name);
        }
    }
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let digit = |b: u8| (b as char).to_digit(16).map(|d| d as u8);
    Some((digit(hi)? << 4) | digit(lo)?)
}

fn sweep_object_graph(doc: &Document, signals: &mut Signals) {
    if doc.trailer.get(b"Encrypt").is_ok() {
        signals.encrypted = true;
    }
    observe_dictionary(&doc.trailer, signals);
    for object in doc.objects.values() {
        observe_object(object, signals);
    }
}

fn observe_dictionary(dict: &lopdf::Dictionary, signals: &mut Signals) {
    for (key, value) in dict.iter() {
        signals.observe(key);
        observe_object(value, signals);
    }
}

fn observe_object(object: &Object, signals: &mut Signals) {
    match object {
        Object::Name(name) => signals.observe(name),
        Object::Array(items) => items.iter().for_each(|item| observe_object(item, signals)),
        Object::Dictionary(dict) => observe_dictionary(dict, signals),
        Object::Stream(stream) => observe_dictionary(&stream.dict, signals),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sweep_decodes_hex_escapes() {
        let mut signals = Signals::default();
        sweep_raw_names(b"<< /S /J#61vaScript /JS (app.alert(1)) >>", &mut signals);
        assert!(signals.javascript);
        assert!(!signals.embedded_files);
    }

    #[test]
    fn test_raw_sweep_exact_names_only() {
        let mut signals = Signals::default();
        sweep_raw_names(b"/JSON /Encrypted /AAX /OpenActionX", &mut signals);
        assert!(!signals.javascript);
        assert!(!signals.encrypted);
        assert!(signals.warnings.is_empty());
    }

    #[test]
    fn test_header_version() {
        assert_eq!(header_version(b"%PDF-1.7\n%..."), Some("1.7".to_string()));
        assert_eq!(header_version(b"junk%PDF-2.0 "), Some("2.0".to_string()));
        assert_eq!(header_version(b"%PDF-"), None);
    }

    #[test]
    fn test_unknown_format_is_invalid() {
        let report = StructuralValidator::new().validate(b"PK\x03\x04 zip bytes");
        assert!(!report.valid);
        assert_eq!(report.format, DocumentFormat::Unknown);
        assert!(!report.errors.is_empty());
    }

    #[test]
    fn test_truncated_pdf_keeps_risk_signals() {
        let data = b"%PDF-1.4\n1 0 obj << /Type /Catalog /OpenAction << /S /JavaScript /JS (x) >> >> endobj";
        let report = StructuralValidator::new().validate(data);
        assert!(!report.valid);
        assert!(report.has_javascript);
        assert_eq!(report.version.as_deref(), Some("1.4"));
        assert!(report.warnings.iter().any(|w| w.contains("OpenAction")));
    }
}
