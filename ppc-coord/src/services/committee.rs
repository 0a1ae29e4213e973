//! Committee decision engine
//!
//! Turns a committee verdict into a decision record, a purchase order (on
//! approval), a hash-anchored evidence record, and a correlation-linked
//! audit trail. The sequence is deliberately not atomic: the decision
//! insert is the one hard gate, and each later write surfaces its own
//! failure with the step name instead of rolling anything back. A partially
//! applied decision stays visible for manual reconciliation; the records
//! themselves are evidence of process integrity, so discarding them
//! silently would be worse than surfacing the gap.

use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use ppc_common::events::{CoordEvent, EventBus};
use ppc_common::{ids, time};

use crate::db;
use crate::error::ApiError;
use crate::models::{ActorContext, CommitteeDecision, EvidenceRecord, PoStatus, PurchaseOrder, Verdict};
use crate::services::recorder::EvidenceRecorder;

/// Decision request, already past HTTP deserialization
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub rfp_id: String,
    pub decision: String,
    pub offer_id: Option<String>,
    pub justification: Option<String>,
    pub correlation_id: Option<String>,
    pub actor: ActorContext,
}

/// Fully assembled result of a decision call
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: CommitteeDecision,
    pub purchase_order: Option<PurchaseOrder>,
    pub evidence: Option<EvidenceRecord>,
    pub correlation_id: Uuid,
}

/// Executes the approve/reject sequence against the shared datastore
#[derive(Clone)]
pub struct DecisionEngine {
    db: SqlitePool,
    bus: EventBus,
    recorder: EvidenceRecorder,
}

impl DecisionEngine {
    pub fn new(db: SqlitePool, bus: EventBus) -> Self {
        let recorder = EvidenceRecorder::new(db.clone());
        Self { db, bus, recorder }
    }

    /// Record a committee verdict on an RFP.
    ///
    /// Reject: decision row + audit event, no purchase order. Approve:
    /// decision row, purchase order, evidence record, evidence back-fill,
    /// audit events. Repeated calls for the same RFP append new decision
    /// rows; the history is the record.
    pub async fn decide(&self, request: DecisionRequest) -> Result<DecisionOutcome, ApiError> {
        // Step 1: validate
        let verdict = Verdict::parse(&request.decision).ok_or_else(|| {
            ApiError::Validation(format!(
                "Unknown decision {:?} (expected approve or reject)",
                request.decision
            ))
        })?;

        let rfp_id = ids::parse(request.rfp_id.trim())
            .map_err(|_| ApiError::Validation(format!("Malformed rfp_id: {:?}", request.rfp_id)))?;

        let offer_id = match (verdict, request.offer_id.as_deref()) {
            (Verdict::Approve, None) => {
                return Err(ApiError::Validation(
                    "offer_id is required for an approve decision".to_string(),
                ))
            }
            (_, Some(raw)) => Some(ids::parse(raw.trim()).map_err(|_| {
                ApiError::Validation(format!("Malformed offer_id: {:?}", raw))
            })?),
            (Verdict::Reject, None) => None,
        };

        // Step 2: resolve or mint the correlation id
        let correlation_id = ids::resolve_correlation_id(request.correlation_id.as_deref());

        // Step 3: the decision insert is the one hard gate
        let decision = CommitteeDecision {
            decision_id: Uuid::new_v4(),
            rfp_id,
            decision: verdict,
            justification: request.justification.clone(),
            decided_by_user_id: request.actor.user_id.clone(),
            decided_at: time::now(),
        };

        db::decisions::insert_decision(&self.db, &decision)
            .await
            .map_err(|e| ApiError::Persistence(format!("insert_decision: {}", e)))?;

        tracing::info!(
            decision_id = %decision.decision_id,
            rfp_id = %rfp_id,
            decision = %verdict.as_str(),
            correlation_id = %correlation_id,
            "Committee decision recorded"
        );

        // Step 4: hash + audit, fire-and-forget
        let decision_hash = self
            .recorder
            .hash_payload(&json!({
                "rfp_id": decision.rfp_id,
                "offer_id": offer_id,
                "decision": decision.decision,
                "justification": decision.justification,
                "decided_by": decision.decided_by_user_id,
                "decided_at": time::to_db(decision.decided_at),
            }))
            .ok();

        self.recorder
            .record_audit_event(
                correlation_id,
                "committee_decision_recorded",
                Some("committee_decision"),
                Some(&decision.decision_id.to_string()),
                Some(format!("RFP {} {}", rfp_id, verdict.as_str())),
                decision_hash,
                &request.actor,
            )
            .await;

        self.bus.emit(CoordEvent::CommitteeDecisionRecorded {
            decision_id: decision.decision_id,
            rfp_id,
            decision: verdict.as_str().to_string(),
            correlation_id,
            timestamp: time::now(),
        });

        // Step 5: a reject stops here
        if verdict == Verdict::Reject {
            return Ok(DecisionOutcome {
                decision,
                purchase_order: None,
                evidence: None,
                correlation_id,
            });
        }

        // Step 6: purchase order. From here on failures surface with the
        // step name and leave the earlier writes in place.
        let offer_id = offer_id.expect("approve verdict carries an offer id");
        let mut po = PurchaseOrder {
            po_id: Uuid::new_v4(),
            rfp_id,
            offer_id,
            status: PoStatus::Created,
            evidence_id: None,
            created_at: time::now(),
        };

        db::decisions::insert_purchase_order(&self.db, &po)
            .await
            .map_err(|e| {
                ApiError::Persistence(format!(
                    "insert_purchase_order (decision {} persisted): {}",
                    decision.decision_id, e
                ))
            })?;

        // Step 7: evidence over the decision + purchase order pair
        let evidence = self
            .recorder
            .record_evidence(
                "purchase_order",
                &po.po_id.to_string(),
                &json!({
                    "decision": decision,
                    "purchase_order": po,
                }),
            )
            .await
            .map_err(|e| {
                ApiError::Persistence(format!(
                    "insert_evidence (purchase order {} has no evidence): {}",
                    po.po_id, e
                ))
            })?;

        // Step 8: back-fill the evidence reference
        db::decisions::attach_evidence(&self.db, po.po_id, evidence.evidence_id)
            .await
            .map_err(|e| {
                ApiError::Persistence(format!(
                    "attach_evidence (evidence {} is orphaned): {}",
                    evidence.evidence_id, e
                ))
            })?;
        po.evidence_id = Some(evidence.evidence_id);

        tracing::info!(
            po_id = %po.po_id,
            rfp_id = %rfp_id,
            offer_id = %offer_id,
            evidence_id = %evidence.evidence_id,
            "Purchase order created"
        );

        // Step 9: audit, fire-and-forget
        let po_hash = self
            .recorder
            .hash_payload(&json!({
                "decision": decision,
                "purchase_order": po,
            }))
            .ok();

        self.recorder
            .record_audit_event(
                correlation_id,
                "purchase_order_created",
                Some("purchase_order"),
                Some(&po.po_id.to_string()),
                Some(format!("PO for RFP {} offer {}", rfp_id, offer_id)),
                po_hash,
                &request.actor,
            )
            .await;

        self.bus.emit(CoordEvent::PurchaseOrderCreated {
            po_id: po.po_id,
            rfp_id,
            correlation_id,
            timestamp: time::now(),
        });

        // Step 10: the fully assembled outcome
        Ok(DecisionOutcome {
            decision,
            purchase_order: Some(po),
            evidence: Some(evidence),
            correlation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;

    async fn test_engine() -> (DecisionEngine, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ppc_common::db::init::create_schema(&pool).await.unwrap();
        let bus = EventBus::new(16);
        (DecisionEngine::new(pool.clone(), bus), pool)
    }

    fn request(rfp_id: Uuid, decision: &str) -> DecisionRequest {
        DecisionRequest {
            rfp_id: rfp_id.to_string(),
            decision: decision.to_string(),
            offer_id: None,
            justification: None,
            correlation_id: None,
            actor: ActorContext::default(),
        }
    }

    #[tokio::test]
    async fn test_reject_produces_no_purchase_order() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        let outcome = engine
            .decide(DecisionRequest {
                justification: Some("price too high".to_string()),
                ..request(rfp_id, "reject")
            })
            .await
            .unwrap();

        assert!(outcome.purchase_order.is_none());
        assert!(outcome.evidence.is_none());
        assert_eq!(outcome.decision.decision, Verdict::Reject);

        let decisions = db::decisions::decisions_for_rfp(&pool, rfp_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].justification.as_deref(), Some("price too high"));

        let pos = db::decisions::purchase_orders_for_rfp(&pool, rfp_id).await.unwrap();
        assert!(pos.is_empty());
    }

    #[tokio::test]
    async fn test_approve_without_offer_fails_validation_and_writes_nothing() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        let result = engine.decide(request(rfp_id, "approve")).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let decisions = db::decisions::decisions_for_rfp(&pool, rfp_id).await.unwrap();
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_verdict_fails_validation() {
        let (engine, _pool) = test_engine().await;
        let result = engine.decide(request(Uuid::new_v4(), "abstain")).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_approve_creates_po_with_evidence_attached() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();
        let offer_id = Uuid::new_v4();

        let outcome = engine
            .decide(DecisionRequest {
                offer_id: Some(offer_id.to_string()),
                ..request(rfp_id, "approve")
            })
            .await
            .unwrap();

        let po = outcome.purchase_order.unwrap();
        let evidence = outcome.evidence.unwrap();

        assert_eq!(po.rfp_id, rfp_id);
        assert_eq!(po.offer_id, offer_id);
        assert_eq!(po.status, PoStatus::Created);
        assert_eq!(po.evidence_id, Some(evidence.evidence_id));
        assert_eq!(evidence.entity_type, "purchase_order");
        assert_eq!(evidence.entity_id, po.po_id.to_string());

        // Back-fill reached the database
        let loaded = db::decisions::load_purchase_order(&pool, po.po_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.evidence_id, Some(evidence.evidence_id));
    }

    #[tokio::test]
    async fn test_approve_audit_chain_shares_correlation_id() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        let outcome = engine
            .decide(DecisionRequest {
                offer_id: Some(Uuid::new_v4().to_string()),
                ..request(rfp_id, "approve")
            })
            .await
            .unwrap();

        let events = db::audit::list_by_correlation(&pool, outcome.correlation_id, 100, 0)
            .await
            .unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"committee_decision_recorded"));
        assert!(types.contains(&"purchase_order_created"));
        assert!(events.iter().all(|e| e.correlation_id == outcome.correlation_id));
    }

    #[tokio::test]
    async fn test_caller_supplied_correlation_id_is_used_verbatim() {
        let (engine, _pool) = test_engine().await;
        let supplied = Uuid::new_v4();

        let outcome = engine
            .decide(DecisionRequest {
                correlation_id: Some(supplied.to_string()),
                justification: None,
                ..request(Uuid::new_v4(), "reject")
            })
            .await
            .unwrap();
        assert_eq!(outcome.correlation_id, supplied);
    }

    #[tokio::test]
    async fn test_malformed_correlation_id_is_replaced_not_coerced() {
        let (engine, _pool) = test_engine().await;

        let outcome = engine
            .decide(DecisionRequest {
                correlation_id: Some("committee-session-7".to_string()),
                ..request(Uuid::new_v4(), "reject")
            })
            .await
            .unwrap();
        assert_ne!(outcome.correlation_id.to_string(), "committee-session-7");
    }

    #[tokio::test]
    async fn test_second_decision_appends_history() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        engine.decide(request(rfp_id, "reject")).await.unwrap();
        engine
            .decide(DecisionRequest {
                offer_id: Some(Uuid::new_v4().to_string()),
                ..request(rfp_id, "approve")
            })
            .await
            .unwrap();

        let decisions = db::decisions::decisions_for_rfp(&pool, rfp_id).await.unwrap();
        assert_eq!(decisions.len(), 2);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_abort_decision() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        // Removing the audit table makes every audit write fail while the
        // business tables stay intact
        sqlx::query("DROP TABLE audit_events").execute(&pool).await.unwrap();

        let outcome = engine
            .decide(DecisionRequest {
                offer_id: Some(Uuid::new_v4().to_string()),
                ..request(rfp_id, "approve")
            })
            .await
            .unwrap();

        assert!(outcome.purchase_order.is_some());
        let decisions = db::decisions::decisions_for_rfp(&pool, rfp_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
    }

    #[tokio::test]
    async fn test_po_insert_failure_names_step_and_keeps_decision() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        // Sabotage only the purchase order table; the decision insert and
        // audit writes still work
        sqlx::query("DROP TABLE purchase_orders").execute(&pool).await.unwrap();

        let result = engine
            .decide(DecisionRequest {
                offer_id: Some(Uuid::new_v4().to_string()),
                ..request(rfp_id, "approve")
            })
            .await;

        match result {
            Err(ApiError::Persistence(msg)) => {
                assert!(msg.contains("insert_purchase_order"), "got: {}", msg);
            }
            other => panic!("expected Persistence error, got {:?}", other.map(|_| ())),
        }

        // Accepted inconsistency window: the decision row survives
        let decisions = db::decisions::decisions_for_rfp(&pool, rfp_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
    }

    #[tokio::test]
    async fn test_evidence_insert_failure_names_step_and_keeps_po() {
        let (engine, pool) = test_engine().await;
        let rfp_id = Uuid::new_v4();

        sqlx::query("DROP TABLE evidence_records").execute(&pool).await.unwrap();

        let result = engine
            .decide(DecisionRequest {
                offer_id: Some(Uuid::new_v4().to_string()),
                ..request(rfp_id, "approve")
            })
            .await;

        match result {
            Err(ApiError::Persistence(msg)) => {
                assert!(msg.contains("insert_evidence"), "got: {}", msg);
            }
            other => panic!("expected Persistence error, got {:?}", other.map(|_| ())),
        }

        // The purchase order exists without evidence, surfaced not hidden
        let pos = db::decisions::purchase_orders_for_rfp(&pool, rfp_id).await.unwrap();
        assert_eq!(pos.len(), 1);
        assert!(pos[0].evidence_id.is_none());
    }
}
