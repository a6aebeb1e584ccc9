//! Repository traits
//!
//! These abstract the persistence backend so the services crate can run
//! against PostgreSQL in production and in-memory maps in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{
    AccessLogEntry, RedactionRecord, RedactionTemplate, SafetyState, SecureDocument,
};
use docshield_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: &SecureDocument) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<SecureDocument>, AppError>;

    /// Overwrite every mutable column. Fails with `NotFound` for unknown ids.
    ///
    /// Callers holding a copy read earlier must use the narrow writers below
    /// instead, or they undo concurrent changes to the other columns.
    async fn update(&self, document: &SecureDocument) -> Result<(), AppError>;

    /// Bump `access_count` and set `last_accessed_at`, nothing else.
    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Point the row at new stored bytes.
    async fn update_content(
        &self,
        id: Uuid,
        content_hash: &str,
        file_size: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn update_safety_state(
        &self,
        id: Uuid,
        state: SafetyState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Returns `true` when a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SecureDocument>, AppError>;
}

/// Persistence for user-authored templates. System templates are compiled in
/// and never stored.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn save(&self, template: &RedactionTemplate) -> Result<(), AppError>;

    /// Returns `true` when a row was removed.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn list_custom(&self) -> Result<Vec<RedactionTemplate>, AppError>;
}

/// Write-once audit evidence for applied redactions.
#[async_trait]
pub trait RedactionRecordRepository: Send + Sync {
    async fn create(&self, record: &RedactionRecord) -> Result<(), AppError>;

    async fn list_for_document(&self, document_id: Uuid)
        -> Result<Vec<RedactionRecord>, AppError>;
}

/// Append-only access log: entries are never updated or deleted.
#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    async fn append(&self, entry: &AccessLogEntry) -> Result<(), AppError>;

    /// Entries for one document, oldest first.
    async fn list_for_document(&self, document_id: Uuid)
        -> Result<Vec<AccessLogEntry>, AppError>;
}
