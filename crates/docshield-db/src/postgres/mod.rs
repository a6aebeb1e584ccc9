//! PostgreSQL repositories
//!
//! Runtime-checked queries (`sqlx::query_as`) so the crate builds without a
//! live database. JSON-shaped fields (scan results, rules, areas) are stored
//! as JSONB.

mod access_log;
mod document;
mod redaction;
mod template;

pub use access_log::PostgresAccessLogRepository;
pub use document::PostgresDocumentRepository;
pub use redaction::PostgresRedactionRecordRepository;
pub use template::PostgresTemplateRepository;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connect to PostgreSQL and apply pending migrations.
pub async fn setup_database(database_url: &str, max_connections: u32) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
