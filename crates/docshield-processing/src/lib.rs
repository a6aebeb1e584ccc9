//! DocShield Processing Library
//!
//! Byte-level document work with no storage or database coupling:
//! - Structural validation of untrusted uploads (PDF envelope, raster headers)
//! - Upload envelope checks (size, extension, declared content type)
//! - Area redaction: preview overlays and permanent, rasterizing redaction
//! - Structural text extraction used to verify redactions

pub mod pdf;
pub mod raster;
pub mod redaction;
pub mod validator;

// Re-export commonly used types
pub use pdf::{extract_text, PageText};
pub use raster::{BlankRasterizer, PageRasterizer, PageSpec, PdftoppmRasterizer};
pub use redaction::{
    DocumentInfo, PageInfo, PermanentRedaction, PreviewDocument, RedactionEngine,
    RedactionOutput,
};
pub use validator::{StructuralValidator, UploadValidator, ValidationError};
