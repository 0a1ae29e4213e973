//! Database initialization tests
//!
//! Verifies schema creation is idempotent and the expected tables exist.

use ppc_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_database_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ppc.db");

    assert!(!db_path.exists());
    let _pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());
}

#[tokio::test]
async fn test_init_creates_expected_tables() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ppc.db");
    let pool = init_database(&db_path).await.unwrap();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

    for expected in [
        "ingest_jobs",
        "column_mappings",
        "committee_decisions",
        "purchase_orders",
        "evidence_records",
        "audit_events",
    ] {
        assert!(names.contains(&expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ppc.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO ingest_jobs (job_id, correlation_id, dataset_type, status, started_at) VALUES ('j1', 'c1', 'needs', 'running', '2026-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();
    drop(pool);

    // Second init must not disturb existing rows
    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingest_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
