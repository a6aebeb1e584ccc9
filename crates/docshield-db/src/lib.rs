//! DocShield Database Layer
//!
//! Repository traits for documents, custom templates, redaction records and
//! the access log, with PostgreSQL and in-memory implementations.
//!
// Module declarations
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;

// Re-exports: repository traits
pub use repository::{
    AccessLogRepository, DocumentRepository, RedactionRecordRepository, TemplateRepository,
};

// Re-exports: in-memory implementations (tests, CLI)
pub use memory::{
    InMemoryAccessLogRepository, InMemoryDocumentRepository, InMemoryRedactionRecordRepository,
    InMemoryTemplateRepository,
};

// Re-exports: PostgreSQL implementations and setup
#[cfg(feature = "postgres")]
pub use postgres::{
    setup_database, PostgresAccessLogRepository, PostgresDocumentRepository,
    PostgresRedactionRecordRepository, PostgresTemplateRepository,
};
