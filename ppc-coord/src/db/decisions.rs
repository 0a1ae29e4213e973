//! Committee decision and purchase order persistence

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ppc_common::{time, Error, Result};

use crate::models::{CommitteeDecision, PoStatus, PurchaseOrder, Verdict};

/// Insert a decision row. This is the hard gate of the decision sequence;
/// callers abort on failure.
pub async fn insert_decision(pool: &SqlitePool, decision: &CommitteeDecision) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO committee_decisions (
            decision_id, rfp_id, decision, justification,
            decided_by_user_id, decided_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(decision.decision_id.to_string())
    .bind(decision.rfp_id.to_string())
    .bind(decision.decision.as_str())
    .bind(&decision.justification)
    .bind(&decision.decided_by_user_id)
    .bind(time::to_db(decision.decided_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// All decisions recorded for an RFP, newest first. Repeat decisions are
/// history, not errors.
pub async fn decisions_for_rfp(pool: &SqlitePool, rfp_id: Uuid) -> Result<Vec<CommitteeDecision>> {
    let rows = sqlx::query(
        r#"
        SELECT decision_id, rfp_id, decision, justification,
               decided_by_user_id, decided_at
        FROM committee_decisions
        WHERE rfp_id = ?
        ORDER BY decided_at DESC
        "#,
    )
    .bind(rfp_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_decision).collect()
}

/// Insert a purchase order (created state, evidence not yet attached)
pub async fn insert_purchase_order(pool: &SqlitePool, po: &PurchaseOrder) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO purchase_orders (
            po_id, rfp_id, offer_id, status, evidence_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(po.po_id.to_string())
    .bind(po.rfp_id.to_string())
    .bind(po.offer_id.to_string())
    .bind(po.status.as_str())
    .bind(po.evidence_id.map(|id| id.to_string()))
    .bind(time::to_db(po.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Back-fill the evidence reference on a purchase order
pub async fn attach_evidence(pool: &SqlitePool, po_id: Uuid, evidence_id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE purchase_orders SET evidence_id = ? WHERE po_id = ?")
        .bind(evidence_id.to_string())
        .bind(po_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Purchase order not found: {}", po_id)));
    }

    Ok(())
}

/// Load a purchase order by id
pub async fn load_purchase_order(pool: &SqlitePool, po_id: Uuid) -> Result<Option<PurchaseOrder>> {
    let row = sqlx::query(
        r#"
        SELECT po_id, rfp_id, offer_id, status, evidence_id, created_at
        FROM purchase_orders
        WHERE po_id = ?
        "#,
    )
    .bind(po_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(decode_purchase_order).transpose()
}

/// Purchase orders created for an RFP, newest first
pub async fn purchase_orders_for_rfp(
    pool: &SqlitePool,
    rfp_id: Uuid,
) -> Result<Vec<PurchaseOrder>> {
    let rows = sqlx::query(
        r#"
        SELECT po_id, rfp_id, offer_id, status, evidence_id, created_at
        FROM purchase_orders
        WHERE rfp_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(rfp_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_purchase_order).collect()
}

fn decode_decision(row: sqlx::sqlite::SqliteRow) -> Result<CommitteeDecision> {
    let decision_id: String = row.get("decision_id");
    let rfp_id: String = row.get("rfp_id");
    let decision: String = row.get("decision");
    let decided_at: String = row.get("decided_at");

    Ok(CommitteeDecision {
        decision_id: ppc_common::ids::parse(&decision_id)
            .map_err(|e| Error::Internal(format!("Malformed decision_id in database: {}", e)))?,
        rfp_id: ppc_common::ids::parse(&rfp_id)
            .map_err(|e| Error::Internal(format!("Malformed rfp_id in database: {}", e)))?,
        decision: Verdict::parse(&decision)
            .ok_or_else(|| Error::Internal(format!("Unknown verdict: {}", decision)))?,
        justification: row.get("justification"),
        decided_by_user_id: row.get("decided_by_user_id"),
        decided_at: time::from_db(&decided_at)?,
    })
}

fn decode_purchase_order(row: sqlx::sqlite::SqliteRow) -> Result<PurchaseOrder> {
    let po_id: String = row.get("po_id");
    let rfp_id: String = row.get("rfp_id");
    let offer_id: String = row.get("offer_id");
    let status: String = row.get("status");
    let evidence_id: Option<String> = row.get("evidence_id");
    let created_at: String = row.get("created_at");

    Ok(PurchaseOrder {
        po_id: ppc_common::ids::parse(&po_id)
            .map_err(|e| Error::Internal(format!("Malformed po_id in database: {}", e)))?,
        rfp_id: ppc_common::ids::parse(&rfp_id)
            .map_err(|e| Error::Internal(format!("Malformed rfp_id in database: {}", e)))?,
        offer_id: ppc_common::ids::parse(&offer_id)
            .map_err(|e| Error::Internal(format!("Malformed offer_id in database: {}", e)))?,
        status: PoStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown PO status: {}", status)))?,
        evidence_id: evidence_id
            .map(|id| {
                ppc_common::ids::parse(&id).map_err(|e| {
                    Error::Internal(format!("Malformed evidence_id in database: {}", e))
                })
            })
            .transpose()?,
        created_at: time::from_db(&created_at)?,
    })
}
