//! Ingestion job persistence

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ppc_common::{time, Error, Result};

use crate::models::{ColumnMapping, DatasetType, IngestJob, JobStatus};

/// Insert a freshly opened job
pub async fn insert_job(pool: &SqlitePool, job: &IngestJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ingest_jobs (
            job_id, correlation_id, upload_id, dataset_type, status,
            rows_total, rows_ok, rows_error, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(job.correlation_id.to_string())
    .bind(&job.upload_id)
    .bind(job.dataset_type.as_str())
    .bind(job.status.as_str())
    .bind(job.rows_total)
    .bind(job.rows_ok)
    .bind(job.rows_error)
    .bind(time::to_db(job.started_at))
    .bind(job.ended_at.map(time::to_db))
    .execute(pool)
    .await?;

    Ok(())
}

/// Write back mutable job fields (status, counts, upload id, end time)
pub async fn update_job(pool: &SqlitePool, job: &IngestJob) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE ingest_jobs
        SET upload_id = ?, status = ?, rows_total = ?, rows_ok = ?,
            rows_error = ?, ended_at = ?
        WHERE job_id = ?
        "#,
    )
    .bind(&job.upload_id)
    .bind(job.status.as_str())
    .bind(job.rows_total)
    .bind(job.rows_ok)
    .bind(job.rows_error)
    .bind(job.ended_at.map(time::to_db))
    .bind(job.job_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a job by its primary identifier
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<IngestJob>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, correlation_id, upload_id, dataset_type, status,
               rows_total, rows_ok, rows_error, started_at, ended_at
        FROM ingest_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(decode_job).transpose()
}

/// Resolve a correlation id to a job.
///
/// Several jobs may share a correlation id across retries; the most recently
/// started one wins.
pub async fn find_by_correlation(
    pool: &SqlitePool,
    correlation_id: Uuid,
) -> Result<Option<IngestJob>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, correlation_id, upload_id, dataset_type, status,
               rows_total, rows_ok, rows_error, started_at, ended_at
        FROM ingest_jobs
        WHERE correlation_id = ?
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(correlation_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(decode_job).transpose()
}

/// Store the accepted column mapping for a job (one per job, latest wins)
pub async fn save_mapping(pool: &SqlitePool, job_id: Uuid, mapping: &ColumnMapping) -> Result<()> {
    let encoded = serde_json::to_string(mapping)
        .map_err(|e| Error::Internal(format!("Failed to serialize mapping: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO column_mappings (job_id, mapping, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            mapping = excluded.mapping,
            created_at = excluded.created_at
        "#,
    )
    .bind(job_id.to_string())
    .bind(encoded)
    .bind(time::to_db(time::now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the stored mapping for a job, if any
pub async fn load_mapping(pool: &SqlitePool, job_id: Uuid) -> Result<Option<ColumnMapping>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT mapping FROM column_mappings WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(pool)
            .await?;

    row.map(|(encoded,)| {
        serde_json::from_str(&encoded)
            .map_err(|e| Error::Internal(format!("Failed to deserialize mapping: {}", e)))
    })
    .transpose()
}

fn decode_job(row: sqlx::sqlite::SqliteRow) -> Result<IngestJob> {
    let job_id: String = row.get("job_id");
    let job_id = ppc_common::ids::parse(&job_id)
        .map_err(|e| Error::Internal(format!("Malformed job_id in database: {}", e)))?;

    let correlation_id: String = row.get("correlation_id");
    let correlation_id = ppc_common::ids::parse(&correlation_id)
        .map_err(|e| Error::Internal(format!("Malformed correlation_id in database: {}", e)))?;

    let dataset_type: String = row.get("dataset_type");
    let dataset_type = DatasetType::parse(&dataset_type)
        .ok_or_else(|| Error::Internal(format!("Unknown dataset_type: {}", dataset_type)))?;

    let status: String = row.get("status");
    let status = JobStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown job status: {}", status)))?;

    let started_at: String = row.get("started_at");
    let started_at = time::from_db(&started_at)?;

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at.as_deref().map(time::from_db).transpose()?;

    Ok(IngestJob {
        job_id,
        correlation_id,
        upload_id: row.get("upload_id"),
        dataset_type,
        status,
        rows_total: row.get("rows_total"),
        rows_ok: row.get("rows_ok"),
        rows_error: row.get("rows_error"),
        started_at,
        ended_at,
    })
}
