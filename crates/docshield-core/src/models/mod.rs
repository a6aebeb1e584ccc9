//! Data models for the pipeline
//!
//! Each sub-module covers one record family: stored documents, scan evidence,
//! redaction templates, redaction areas/records and the access log.

mod access;
mod document;
mod redaction;
mod scan;
mod template;

pub use access::*;
pub use document::*;
pub use redaction::*;
pub use scan::*;
pub use template::*;
