//! Evidence and audit log persistence
//!
//! Evidence records and audit events are insert-only. Nothing in this module
//! updates or deletes either table.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ppc_common::{time, Error, Result};

use crate::models::{AuditEvent, EvidenceRecord};

/// Insert an evidence record
pub async fn insert_evidence(pool: &SqlitePool, evidence: &EvidenceRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO evidence_records (
            evidence_id, entity_type, entity_id, payload_hash_sha256, created_at
        ) VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(evidence.evidence_id.to_string())
    .bind(&evidence.entity_type)
    .bind(&evidence.entity_id)
    .bind(&evidence.payload_hash_sha256)
    .bind(time::to_db(evidence.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an evidence record by id
pub async fn load_evidence(pool: &SqlitePool, evidence_id: Uuid) -> Result<Option<EvidenceRecord>> {
    let row = sqlx::query(
        r#"
        SELECT evidence_id, entity_type, entity_id, payload_hash_sha256, created_at
        FROM evidence_records
        WHERE evidence_id = ?
        "#,
    )
    .bind(evidence_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(decode_evidence).transpose()
}

/// Insert an audit event
pub async fn insert_audit_event(pool: &SqlitePool, event: &AuditEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events (
            event_id, correlation_id, event_type, entity_type, entity_id,
            summary, payload_hash_sha256, actor_user_id, actor_role,
            company_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.event_id.to_string())
    .bind(event.correlation_id.to_string())
    .bind(&event.event_type)
    .bind(&event.entity_type)
    .bind(&event.entity_id)
    .bind(&event.summary)
    .bind(&event.payload_hash_sha256)
    .bind(&event.actor_user_id)
    .bind(&event.actor_role)
    .bind(&event.company_id)
    .bind(time::to_db(event.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Count audit events for one correlation id
pub async fn count_by_correlation(pool: &SqlitePool, correlation_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_events WHERE correlation_id = ?")
            .bind(correlation_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Audit chain for one workflow run, oldest first (causal order)
pub async fn list_by_correlation(
    pool: &SqlitePool,
    correlation_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT event_id, correlation_id, event_type, entity_type, entity_id,
               summary, payload_hash_sha256, actor_user_id, actor_role,
               company_id, created_at
        FROM audit_events
        WHERE correlation_id = ?
        ORDER BY created_at ASC, event_id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(correlation_id.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_audit_event).collect()
}

/// Count audit events for one entity
pub async fn count_by_entity(
    pool: &SqlitePool,
    entity_type: &str,
    entity_id: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_events WHERE entity_type = ? AND entity_id = ?",
    )
    .bind(entity_type)
    .bind(entity_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Audit trail for one entity, oldest first
pub async fn list_by_entity(
    pool: &SqlitePool,
    entity_type: &str,
    entity_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT event_id, correlation_id, event_type, entity_type, entity_id,
               summary, payload_hash_sha256, actor_user_id, actor_role,
               company_id, created_at
        FROM audit_events
        WHERE entity_type = ? AND entity_id = ?
        ORDER BY created_at ASC, event_id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_audit_event).collect()
}

fn decode_evidence(row: sqlx::sqlite::SqliteRow) -> Result<EvidenceRecord> {
    let evidence_id: String = row.get("evidence_id");
    let created_at: String = row.get("created_at");

    Ok(EvidenceRecord {
        evidence_id: ppc_common::ids::parse(&evidence_id)
            .map_err(|e| Error::Internal(format!("Malformed evidence_id in database: {}", e)))?,
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        payload_hash_sha256: row.get("payload_hash_sha256"),
        created_at: time::from_db(&created_at)?,
    })
}

fn decode_audit_event(row: sqlx::sqlite::SqliteRow) -> Result<AuditEvent> {
    let event_id: String = row.get("event_id");
    let correlation_id: String = row.get("correlation_id");
    let created_at: String = row.get("created_at");

    Ok(AuditEvent {
        event_id: ppc_common::ids::parse(&event_id)
            .map_err(|e| Error::Internal(format!("Malformed event_id in database: {}", e)))?,
        correlation_id: ppc_common::ids::parse(&correlation_id)
            .map_err(|e| Error::Internal(format!("Malformed correlation_id in database: {}", e)))?,
        event_type: row.get("event_type"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        summary: row.get("summary"),
        payload_hash_sha256: row.get("payload_hash_sha256"),
        actor_user_id: row.get("actor_user_id"),
        actor_role: row.get("actor_role"),
        company_id: row.get("company_id"),
        created_at: time::from_db(&created_at)?,
    })
}
