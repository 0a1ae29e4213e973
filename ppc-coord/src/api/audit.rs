//! Audit trail read API
//!
//! GET /audit/correlation/{correlation_id}, GET /audit/entity/{type}/{id}
//!
//! Read-only views over the append-only audit log, paginated. Events are
//! returned oldest first so a page reads as the causal chain of one
//! workflow run.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db,
    error::ApiResult,
    models::AuditEvent,
    pagination::{calculate_pagination, PAGE_SIZE},
    AppState,
};

/// Query parameters for audit listing
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// Paginated audit listing response
#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub total_events: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub events: Vec<AuditEvent>,
}

/// GET /audit/correlation/{correlation_id}
///
/// The audit chain for one workflow run.
pub async fn audit_by_correlation(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditListResponse>> {
    let total = db::audit::count_by_correlation(&state.db, correlation_id).await?;
    let pagination = calculate_pagination(total, query.page);

    let events = db::audit::list_by_correlation(
        &state.db,
        correlation_id,
        PAGE_SIZE,
        pagination.offset,
    )
    .await?;

    Ok(Json(AuditListResponse {
        total_events: total,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        events,
    }))
}

/// GET /audit/entity/{entity_type}/{entity_id}
///
/// The audit trail attached to one entity.
pub async fn audit_by_entity(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditListResponse>> {
    let total = db::audit::count_by_entity(&state.db, &entity_type, &entity_id).await?;
    let pagination = calculate_pagination(total, query.page);

    let events = db::audit::list_by_entity(
        &state.db,
        &entity_type,
        &entity_id,
        PAGE_SIZE,
        pagination.offset,
    )
    .await?;

    Ok(Json(AuditListResponse {
        total_events: total,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        events,
    }))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/audit/correlation/:correlation_id", get(audit_by_correlation))
        .route("/audit/entity/:entity_type/:entity_id", get(audit_by_entity))
}
