//! Scan evidence attached to a document: structural validation and reputation results.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Document formats the pipeline understands, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Png,
    Jpeg,
    Unknown,
}

impl DocumentFormat {
    /// Detect the format from the leading bytes. Declared MIME types and file
    /// extensions are never consulted here.
    pub fn sniff(data: &[u8]) -> Self {
        // Image signatures are anchored at offset 0 and win over a PDF header
        // found further in. PDF readers tolerate up to 1024 bytes of junk
        // before the header.
        let head = &data[..data.len().min(1024)];
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            DocumentFormat::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            DocumentFormat::Jpeg
        } else if head.windows(5).any(|w| w == b"%PDF-") {
            DocumentFormat::Pdf
        } else {
            DocumentFormat::Unknown
        }
    }

    pub fn from_mime(content_type: &str) -> Self {
        match content_type.trim().to_lowercase().as_str() {
            "application/pdf" | "application/x-pdf" => DocumentFormat::Pdf,
            "image/png" => DocumentFormat::Png,
            "image/jpeg" | "image/jpg" => DocumentFormat::Jpeg,
            _ => DocumentFormat::Unknown,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Unknown => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpeg => "jpg",
            DocumentFormat::Unknown => "bin",
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, DocumentFormat::Png | DocumentFormat::Jpeg)
    }
}

impl Display for DocumentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Png => write!(f, "png"),
            DocumentFormat::Jpeg => write!(f, "jpeg"),
            DocumentFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of structural inspection of a byte stream.
///
/// `valid` says whether the stream parses as its format at all. The risk
/// flags are orthogonal: a valid document may still be encrypted or carry
/// active content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub format: DocumentFormat,
    pub is_encrypted: bool,
    pub has_javascript: bool,
    pub has_embedded_files: bool,
    pub version: Option<String>,
    pub page_count: Option<u32>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn empty(format: DocumentFormat) -> Self {
        Self {
            valid: false,
            format,
            is_encrypted: false,
            has_javascript: false,
            has_embedded_files: false,
            version: None,
            page_count: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn invalid(format: DocumentFormat, error: impl Into<String>) -> Self {
        let mut report = Self::empty(format);
        report.errors.push(error.into());
        report
    }

    pub fn has_risk_signals(&self) -> bool {
        self.is_encrypted || self.has_javascript || self.has_embedded_files
    }
}

/// What the reputation lookup said about the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirusScanSummary {
    /// False when no lookup took place (service disabled by configuration).
    pub scanned: bool,
    pub safe: bool,
    pub message: String,
}

/// Evidence stored on a document once scanning completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentScanResult {
    pub validation: ValidationReport,
    pub virus_scan: VirusScanSummary,
    /// Final gate verdict (reputation verdict combined with content policy)
    pub gate_safe: bool,
}
