//! Database initialization
//!
//! Opens (creating if absent) the coordination SQLite database and brings the
//! schema up idempotently. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_pragmas(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer; the finalize callback
    // and status polls overlap routinely
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Run all idempotent table/index creation
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_ingest_jobs_table(pool).await?;
    create_column_mappings_table(pool).await?;
    create_committee_decisions_table(pool).await?;
    create_purchase_orders_table(pool).await?;
    create_evidence_records_table(pool).await?;
    create_audit_events_table(pool).await?;
    Ok(())
}

async fn create_ingest_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingest_jobs (
            job_id TEXT PRIMARY KEY,
            correlation_id TEXT NOT NULL,
            upload_id TEXT,
            dataset_type TEXT NOT NULL,
            status TEXT NOT NULL,
            rows_total INTEGER,
            rows_ok INTEGER,
            rows_error INTEGER,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // finalize may arrive keyed by correlation id only
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ingest_jobs_correlation ON ingest_jobs(correlation_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_column_mappings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS column_mappings (
            job_id TEXT PRIMARY KEY REFERENCES ingest_jobs(job_id),
            mapping TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_committee_decisions_table(pool: &SqlitePool) -> Result<()> {
    // No uniqueness on rfp_id: repeated decisions append rows, and the audit
    // chain keeps revisions traceable
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS committee_decisions (
            decision_id TEXT PRIMARY KEY,
            rfp_id TEXT NOT NULL,
            decision TEXT NOT NULL,
            justification TEXT,
            decided_by_user_id TEXT,
            decided_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_committee_decisions_rfp ON committee_decisions(rfp_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_purchase_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purchase_orders (
            po_id TEXT PRIMARY KEY,
            rfp_id TEXT NOT NULL,
            offer_id TEXT NOT NULL,
            status TEXT NOT NULL,
            evidence_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_purchase_orders_rfp ON purchase_orders(rfp_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_evidence_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evidence_records (
            evidence_id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload_hash_sha256 TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_audit_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_events (
            event_id TEXT PRIMARY KEY,
            correlation_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT,
            entity_id TEXT,
            summary TEXT,
            payload_hash_sha256 TEXT,
            actor_user_id TEXT,
            actor_role TEXT,
            company_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_events_correlation ON audit_events(correlation_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_events_entity ON audit_events(entity_type, entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
