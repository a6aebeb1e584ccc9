use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{AccessLogEntry, ClientInfo};
use docshield_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::AccessLogRepository;

#[derive(Debug, sqlx::FromRow)]
struct AccessLogRow {
    id: Uuid,
    document_id: Uuid,
    actor_id: Uuid,
    access_type: String,
    outcome: String,
    secondary_verification_required: bool,
    mfa_verified: bool,
    password_verified: bool,
    denial_reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccessLogRow> for AccessLogEntry {
    type Error = AppError;

    fn try_from(row: AccessLogRow) -> Result<Self, Self::Error> {
        Ok(AccessLogEntry {
            id: row.id,
            document_id: row.document_id,
            actor_id: row.actor_id,
            access_type: row.access_type.parse()?,
            outcome: row.outcome.parse()?,
            secondary_verification_required: row.secondary_verification_required,
            mfa_verified: row.mfa_verified,
            password_verified: row.password_verified,
            denial_reason: row.denial_reason,
            client: ClientInfo {
                ip_address: row.ip_address,
                user_agent: row.user_agent,
            },
            created_at: row.created_at,
        })
    }
}

/// Append-only: the table carries a trigger that rejects UPDATE and DELETE.
#[derive(Clone)]
pub struct PostgresAccessLogRepository {
    pool: PgPool,
}

impl PostgresAccessLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessLogRepository for PostgresAccessLogRepository {
    #[tracing::instrument(skip(self, entry), fields(
        db.table = "document_access_log",
        db.operation = "insert",
        document_id = %entry.document_id
    ))]
    async fn append(&self, entry: &AccessLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO document_access_log (
                id, document_id, actor_id, access_type, outcome,
                secondary_verification_required, mfa_verified, password_verified,
                denial_reason, ip_address, user_agent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.document_id)
        .bind(entry.actor_id)
        .bind(entry.access_type.as_str())
        .bind(entry.outcome.as_str())
        .bind(entry.secondary_verification_required)
        .bind(entry.mfa_verified)
        .bind(entry.password_verified)
        .bind(&entry.denial_reason)
        .bind(&entry.client.ip_address)
        .bind(&entry.client.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to append access log entry");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "document_access_log",
        db.operation = "select",
        document_id = %document_id
    ))]
    async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<AccessLogEntry>, AppError> {
        let rows = sqlx::query_as::<Postgres, AccessLogRow>(
            r#"
            SELECT id, document_id, actor_id, access_type, outcome,
                   secondary_verification_required, mfa_verified, password_verified,
                   denial_reason, ip_address, user_agent, created_at
            FROM document_access_log
            WHERE document_id = $1
            ORDER BY seq
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list access log");
            AppError::Database(e)
        })?;

        rows.into_iter().map(AccessLogEntry::try_from).collect()
    }
}
