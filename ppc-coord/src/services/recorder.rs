//! Evidence and audit recorder
//!
//! Evidence writes are part of their caller's sequence and propagate
//! failures. Audit writes are deliberately asymmetric: a failed audit insert
//! is logged and swallowed so it can never roll back or block the business
//! transaction that triggered it.

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use ppc_common::{hashing, time, Result};

use crate::db;
use crate::models::{ActorContext, AuditEvent, EvidenceRecord};

/// Records evidence and audit events against the shared datastore
#[derive(Clone)]
pub struct EvidenceRecorder {
    db: SqlitePool,
}

impl EvidenceRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Hash a payload with the canonical encoding
    pub fn hash_payload<T: Serialize>(&self, payload: &T) -> Result<String> {
        hashing::hash_payload(payload)
    }

    /// Create an immutable evidence record for an entity.
    ///
    /// Never overwrites: a changed payload gets a new record with a new id,
    /// and the owning entity re-points to it.
    pub async fn record_evidence<T: Serialize>(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &T,
    ) -> Result<EvidenceRecord> {
        let evidence = EvidenceRecord {
            evidence_id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            payload_hash_sha256: hashing::hash_payload(payload)?,
            created_at: time::now(),
        };

        db::audit::insert_evidence(&self.db, &evidence).await?;

        tracing::debug!(
            evidence_id = %evidence.evidence_id,
            entity_type = %entity_type,
            entity_id = %entity_id,
            "Evidence record created"
        );

        Ok(evidence)
    }

    /// Append an audit event, best-effort.
    ///
    /// Returns the event when the write succeeded, `None` when it did not.
    /// Callers never branch on the result; the return value only exists so
    /// responses can echo the event id when available.
    pub async fn record_audit_event(
        &self,
        correlation_id: Uuid,
        event_type: &str,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        summary: Option<String>,
        payload_hash: Option<String>,
        actor: &ActorContext,
    ) -> Option<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            correlation_id,
            event_type: event_type.to_string(),
            entity_type: entity_type.map(|s| s.to_string()),
            entity_id: entity_id.map(|s| s.to_string()),
            summary,
            payload_hash_sha256: payload_hash,
            actor_user_id: actor.user_id.clone(),
            actor_role: actor.role.clone(),
            company_id: actor.company_id.clone(),
            created_at: time::now(),
        };

        match db::audit::insert_audit_event(&self.db, &event).await {
            Ok(()) => Some(event),
            Err(e) => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    event_type = %event_type,
                    error = %e,
                    "Audit event write failed; continuing without it"
                );
                None
            }
        }
    }
}
