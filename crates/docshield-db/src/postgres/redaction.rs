use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{PatternUsage, RedactionArea, RedactionRecord};
use docshield_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::RedactionRecordRepository;

#[derive(Debug, sqlx::FromRow)]
struct RedactionRecordRow {
    id: Uuid,
    source_document_id: Uuid,
    result_document_id: Option<Uuid>,
    actor_id: Uuid,
    areas: Json<Vec<RedactionArea>>,
    patterns: Json<Vec<PatternUsage>>,
    is_permanent: bool,
    redaction_count: i32,
    created_at: DateTime<Utc>,
}

impl From<RedactionRecordRow> for RedactionRecord {
    fn from(row: RedactionRecordRow) -> Self {
        RedactionRecord {
            id: row.id,
            source_document_id: row.source_document_id,
            result_document_id: row.result_document_id,
            actor_id: row.actor_id,
            areas: row.areas.0,
            patterns: row.patterns.0,
            is_permanent: row.is_permanent,
            redaction_count: row.redaction_count.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PostgresRedactionRecordRepository {
    pool: PgPool,
}

impl PostgresRedactionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RedactionRecordRepository for PostgresRedactionRecordRepository {
    #[tracing::instrument(skip(self, record), fields(
        db.table = "redaction_records",
        db.operation = "insert",
        db.record_id = %record.id
    ))]
    async fn create(&self, record: &RedactionRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO redaction_records (
                id, source_document_id, result_document_id, actor_id, areas, patterns,
                is_permanent, redaction_count, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.source_document_id)
        .bind(record.result_document_id)
        .bind(record.actor_id)
        .bind(Json(&record.areas))
        .bind(Json(&record.patterns))
        .bind(record.is_permanent)
        .bind(record.redaction_count as i32)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert redaction record");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "redaction_records",
        db.operation = "select",
        document_id = %document_id
    ))]
    async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<RedactionRecord>, AppError> {
        let rows = sqlx::query_as::<Postgres, RedactionRecordRow>(
            r#"
            SELECT id, source_document_id, result_document_id, actor_id, areas, patterns,
                   is_permanent, redaction_count, created_at
            FROM redaction_records
            WHERE source_document_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list redaction records");
            AppError::Database(e)
        })?;

        Ok(rows.into_iter().map(RedactionRecord::from).collect())
    }
}
