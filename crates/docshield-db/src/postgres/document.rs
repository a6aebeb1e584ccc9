use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{AccessPolicy, DocumentScanResult, SafetyState, SecureDocument};
use docshield_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::DocumentRepository;

const DOCUMENT_COLUMNS: &str = r#"
    id, owner_id, original_filename, file_size, content_type, content_hash,
    storage_key, safety_state, scan_result, requires_mfa, access_password_hash,
    is_encrypted, expires_at, page_count, access_count, last_accessed_at,
    created_at, updated_at
"#;

/// Row type for secure_documents table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    owner_id: Uuid,
    original_filename: String,
    file_size: i64,
    content_type: String,
    content_hash: String,
    storage_key: String,
    safety_state: String,
    scan_result: Option<Json<DocumentScanResult>>,
    requires_mfa: bool,
    access_password_hash: Option<String>,
    is_encrypted: bool,
    expires_at: Option<DateTime<Utc>>,
    page_count: Option<i32>,
    access_count: i64,
    last_accessed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for SecureDocument {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(SecureDocument {
            id: row.id,
            owner_id: row.owner_id,
            original_filename: row.original_filename,
            file_size: row.file_size,
            content_type: row.content_type,
            content_hash: row.content_hash,
            storage_key: row.storage_key,
            safety_state: row.safety_state.parse()?,
            scan_result: row.scan_result.map(|json| json.0),
            policy: AccessPolicy {
                requires_mfa: row.requires_mfa,
                access_password_hash: row.access_password_hash,
                is_encrypted: row.is_encrypted,
                expires_at: row.expires_at,
            },
            page_count: row.page_count.map(|n| n.max(0) as u32),
            access_count: row.access_count,
            last_accessed_at: row.last_accessed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: PgPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    #[tracing::instrument(skip(self, document), fields(
        db.table = "secure_documents",
        db.operation = "insert",
        db.record_id = %document.id
    ))]
    async fn create(&self, document: &SecureDocument) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO secure_documents (
                id, owner_id, original_filename, file_size, content_type, content_hash,
                storage_key, safety_state, scan_result, requires_mfa, access_password_hash,
                is_encrypted, expires_at, page_count, access_count, last_accessed_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(document.id)
        .bind(document.owner_id)
        .bind(&document.original_filename)
        .bind(document.file_size)
        .bind(&document.content_type)
        .bind(&document.content_hash)
        .bind(&document.storage_key)
        .bind(document.safety_state.as_str())
        .bind(document.scan_result.as_ref().map(Json))
        .bind(document.policy.requires_mfa)
        .bind(&document.policy.access_password_hash)
        .bind(document.policy.is_encrypted)
        .bind(document.policy.expires_at)
        .bind(document.page_count.map(|n| n as i32))
        .bind(document.access_count)
        .bind(document.last_accessed_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert document");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "secure_documents",
        db.operation = "select",
        db.record_id = %id
    ))]
    async fn get(&self, id: Uuid) -> Result<Option<SecureDocument>, AppError> {
        let row = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM secure_documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch document");
            AppError::Database(e)
        })?;

        row.map(SecureDocument::try_from).transpose()
    }

    #[tracing::instrument(skip(self, document), fields(
        db.table = "secure_documents",
        db.operation = "update",
        db.record_id = %document.id
    ))]
    async fn update(&self, document: &SecureDocument) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE secure_documents
            SET file_size = $2,
                content_type = $3,
                content_hash = $4,
                storage_key = $5,
                safety_state = $6,
                scan_result = $7,
                requires_mfa = $8,
                access_password_hash = $9,
                is_encrypted = $10,
                expires_at = $11,
                page_count = $12,
                access_count = $13,
                last_accessed_at = $14,
                updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(document.id)
        .bind(document.file_size)
        .bind(&document.content_type)
        .bind(&document.content_hash)
        .bind(&document.storage_key)
        .bind(document.safety_state.as_str())
        .bind(document.scan_result.as_ref().map(Json))
        .bind(document.policy.requires_mfa)
        .bind(&document.policy.access_password_hash)
        .bind(document.policy.is_encrypted)
        .bind(document.policy.expires_at)
        .bind(document.page_count.map(|n| n as i32))
        .bind(document.access_count)
        .bind(document.last_accessed_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update document");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document {}", document.id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "secure_documents",
        db.operation = "update",
        db.record_id = %id
    ))]
    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE secure_documents
            SET access_count = access_count + 1,
                last_accessed_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record document access");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, content_hash), fields(
        db.table = "secure_documents",
        db.operation = "update",
        db.record_id = %id
    ))]
    async fn update_content(
        &self,
        id: Uuid,
        content_hash: &str,
        file_size: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE secure_documents
            SET content_hash = $2,
                file_size = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(content_hash)
        .bind(file_size)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update document content");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "secure_documents",
        db.operation = "update",
        db.record_id = %id
    ))]
    async fn update_safety_state(
        &self,
        id: Uuid,
        state: SafetyState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE secure_documents SET safety_state = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update document state");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "secure_documents",
        db.operation = "delete",
        db.record_id = %id
    ))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM secure_documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete document");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "secure_documents",
        db.operation = "select"
    ))]
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SecureDocument>, AppError> {
        let rows = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM secure_documents WHERE owner_id = $1 ORDER BY created_at",
            DOCUMENT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list documents");
            AppError::Database(e)
        })?;

        rows.into_iter().map(SecureDocument::try_from).collect()
    }
}
