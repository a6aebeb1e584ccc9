//! Validation of untrusted uploads
//!
//! `UploadValidator` checks the envelope a client declares (size, filename,
//! content type). `StructuralValidator` inspects the bytes themselves.

mod structure;
mod upload;

pub use structure::StructuralValidator;
pub use upload::{UploadValidator, ValidationError};
