use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshield_core::models::{RedactionRule, RedactionTemplate, TemplateKind};
use docshield_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::TemplateRepository;

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: String,
    name: String,
    description: Option<String>,
    owner_id: Uuid,
    shared: bool,
    rules: Json<Vec<RedactionRule>>,
    created_at: DateTime<Utc>,
}

impl From<TemplateRow> for RedactionTemplate {
    fn from(row: TemplateRow) -> Self {
        RedactionTemplate {
            id: row.id,
            name: row.name,
            description: row.description,
            kind: TemplateKind::Custom {
                owner_id: row.owner_id,
                shared: row.shared,
            },
            rules: row.rules.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    #[tracing::instrument(skip(self, template), fields(
        db.table = "redaction_templates",
        db.operation = "upsert",
        db.record_id = %template.id
    ))]
    async fn save(&self, template: &RedactionTemplate) -> Result<(), AppError> {
        let (owner_id, shared) = match template.kind {
            TemplateKind::Custom { owner_id, shared } => (owner_id, shared),
            TemplateKind::System => {
                return Err(AppError::InvalidInput(
                    "System templates are not persisted".to_string(),
                ))
            }
        };

        sqlx::query(
            r#"
            INSERT INTO redaction_templates (id, name, description, owner_id, shared, rules, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                shared = EXCLUDED.shared,
                rules = EXCLUDED.rules
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(owner_id)
        .bind(shared)
        .bind(Json(&template.rules))
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to save template");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "redaction_templates",
        db.operation = "delete",
        db.record_id = %id
    ))]
    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM redaction_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete template");
                AppError::Database(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(
        db.table = "redaction_templates",
        db.operation = "select"
    ))]
    async fn list_custom(&self) -> Result<Vec<RedactionTemplate>, AppError> {
        let rows = sqlx::query_as::<Postgres, TemplateRow>(
            r#"
            SELECT id, name, description, owner_id, shared, rules, created_at
            FROM redaction_templates
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list templates");
            AppError::Database(e)
        })?;

        Ok(rows.into_iter().map(RedactionTemplate::from).collect())
    }
}
