//! Committee decision, purchase order, evidence, and audit models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Committee verdict on an RFP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approve => "approve",
            Verdict::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Verdict::Approve),
            "reject" => Some(Verdict::Reject),
            _ => None,
        }
    }
}

/// One verdict on one RFP. Immutable once recorded; a revised verdict is a
/// new row, never an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeDecision {
    pub decision_id: Uuid,
    pub rfp_id: Uuid,
    pub decision: Verdict,
    pub justification: Option<String>,
    pub decided_by_user_id: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Purchase order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    Created,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::Created => "created",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(PoStatus::Created),
            _ => None,
        }
    }
}

/// Created only on approval, within the same logical transaction as its
/// governing decision. `evidence_id` is back-filled after the evidence
/// record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub po_id: Uuid,
    pub rfp_id: Uuid,
    pub offer_id: Uuid,
    pub status: PoStatus,
    pub evidence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Immutable hash-anchored proof object attached to a business entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub evidence_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub payload_hash_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit log entry. Multiple events sharing a correlation id
/// form the causal chain of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub correlation_id: Uuid,
    pub event_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub summary: Option<String>,
    pub payload_hash_sha256: Option<String>,
    pub actor_user_id: Option<String>,
    pub actor_role: Option<String>,
    pub company_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who performed an operation, as reported by the (excluded) auth layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub company_id: Option<String>,
}
