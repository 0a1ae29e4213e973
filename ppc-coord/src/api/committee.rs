//! Committee decision API handler
//!
//! POST /committee/decide

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{ActorContext, CommitteeDecision, EvidenceRecord, PurchaseOrder},
    services::{DecisionEngine, DecisionRequest},
    AppState,
};

/// POST /committee/decide request
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub rfp_id: String,
    /// "approve" or "reject"
    pub decision: String,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    /// Accepted verbatim when a well-formed UUID, replaced otherwise
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub actor: Option<ActorContext>,
}

/// POST /committee/decide response
#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub decision: CommitteeDecision,
    pub purchase_order: Option<PurchaseOrder>,
    pub evidence: Option<EvidenceRecord>,
    /// Key for later audit lookup
    pub correlation_id: Uuid,
}

/// POST /committee/decide
///
/// Record a committee verdict on an RFP. Approval creates a purchase order
/// with attached evidence; rejection records the verdict only.
pub async fn decide(
    State(state): State<AppState>,
    Json(request): Json<DecideRequest>,
) -> ApiResult<Json<DecideResponse>> {
    let engine = DecisionEngine::new(state.db.clone(), state.event_bus.clone());

    let outcome = engine
        .decide(DecisionRequest {
            rfp_id: request.rfp_id,
            decision: request.decision,
            offer_id: request.offer_id,
            justification: request.justification,
            correlation_id: request.correlation_id,
            actor: request.actor.unwrap_or_default(),
        })
        .await?;

    Ok(Json(DecideResponse {
        decision: outcome.decision,
        purchase_order: outcome.purchase_order,
        evidence: outcome.evidence,
        correlation_id: outcome.correlation_id,
    }))
}

/// Build committee routes
pub fn committee_routes() -> Router<AppState> {
    Router::new().route("/committee/decide", post(decide))
}
