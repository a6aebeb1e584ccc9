//! DocShield Services Layer
//!
//! Business services of the document pipeline: the pattern library and
//! content scanner, the reputation gate, the access gate, custom template
//! management and the `SecureDocumentService` that ties them to storage and
//! the repositories.

pub mod access;
pub mod documents;
pub mod redaction;
pub mod reputation;
pub mod templates;

pub use access::{
    hash_access_password, verify_grant, AccessCredential, AccessGate, AccessGrant, GrantClaims,
    IdentityVerifier,
};
pub use documents::{
    DocumentContent, DocumentServiceParts, PageScan, RedactRequest, RedactionMode,
    RedactionOutcome, SecureDocumentService,
};
pub use docshield_processing::{
    extract_text, PdftoppmRasterizer, RedactionEngine, RedactionOutput, StructuralValidator,
    UploadValidator,
};
pub use docshield_storage::{create_storage, MemoryStorage, Storage};
pub use redaction::{ContentScanner, PatternLibrary, RuleSelection, TextScanResult};
#[cfg(feature = "clamav")]
pub use reputation::ClamAvReputation;
#[cfg(feature = "http-reputation")]
pub use reputation::HttpReputation;
pub use reputation::{GateScan, ReputationGate, ReputationService, ReputationVerdict};
pub use templates::TemplateService;
