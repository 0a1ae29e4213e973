//! Ingestion API handlers
//!
//! POST /ingest/session, GET /ingest/status, POST /ingest/finalize,
//! POST /ingest/mapping

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{ColumnMapping, IngestJob},
    services::{FinalizeIntent, IngestTracker},
    AppState,
};

/// POST /ingest/session request
#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub dataset_type: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /ingest/session response
#[derive(Debug, Serialize)]
pub struct OpenSessionResponse {
    pub job_id: Uuid,
    pub correlation_id: Uuid,
    pub status: String,
    /// Signed URL the client uploads the file to; this service never sees
    /// the file bytes
    pub upload_url: String,
}

/// GET /ingest/status response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub correlation_id: Uuid,
    pub dataset_type: String,
    pub status: String,
    pub upload_id: Option<String>,
    pub rows_total: Option<i64>,
    pub rows_ok: Option<i64>,
    pub rows_error: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<IngestJob> for JobStatusResponse {
    fn from(job: IngestJob) -> Self {
        Self {
            job_id: job.job_id,
            correlation_id: job.correlation_id,
            dataset_type: job.dataset_type.as_str().to_string(),
            status: job.status.as_str().to_string(),
            upload_id: job.upload_id,
            rows_total: job.rows_total,
            rows_ok: job.rows_ok,
            rows_error: job.rows_error,
            started_at: job.started_at,
            ended_at: job.ended_at,
        }
    }
}

/// POST /ingest/finalize request
///
/// Arrives from the workflow engine's callback, or from a client forcing a
/// stuck job to completion; both go through the same idempotent operation.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub rows_total: Option<i64>,
    #[serde(default)]
    pub rows_ok: Option<i64>,
    #[serde(default)]
    pub rows_error: Option<i64>,
}

/// POST /ingest/finalize response
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub job_id: Uuid,
    pub status: String,
    /// True when the job was already terminal and this call changed nothing
    pub already_terminal: bool,
}

/// POST /ingest/mapping request
#[derive(Debug, Deserialize)]
pub struct ApplyMappingRequest {
    /// Source column name → target schema field name
    pub mapping: BTreeMap<String, String>,
}

/// POST /ingest/mapping response
#[derive(Debug, Serialize)]
pub struct ApplyMappingResponse {
    pub job_id: Uuid,
    pub status: String,
    pub mapped_fields: Vec<String>,
}

/// POST /ingest/session
///
/// Open an ingestion session: registers the job, obtains the signed upload
/// URL, and hands processing to the workflow engine.
pub async fn open_session(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> ApiResult<Json<OpenSessionResponse>> {
    let actor = crate::models::ActorContext {
        user_id: request.user_id.clone(),
        role: None,
        company_id: request.company_id.clone(),
    };

    let tracker = IngestTracker::new(
        state.db.clone(),
        state.event_bus.clone(),
        state.engine.clone(),
    );
    let outcome = tracker
        .open_session(
            &request.dataset_type,
            &request.file_name,
            &request.content_type,
            &actor,
        )
        .await?;

    Ok(Json(OpenSessionResponse {
        job_id: outcome.job.job_id,
        correlation_id: outcome.job.correlation_id,
        status: outcome.job.status.as_str().to_string(),
        upload_url: outcome.upload_url,
    }))
}

/// GET /ingest/status/{job_id}
///
/// Poll job progress. Long-running jobs legitimately stay `running`; the
/// caller owns any fallback action.
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let tracker = IngestTracker::new(
        state.db.clone(),
        state.event_bus.clone(),
        state.engine.clone(),
    );
    let job = tracker.get_status(job_id).await?;
    Ok(Json(JobStatusResponse::from(job)))
}

/// POST /ingest/finalize
///
/// Finalize a job by job_id or correlation_id. Idempotent.
pub async fn finalize(
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<Json<FinalizeResponse>> {
    let tracker = IngestTracker::new(
        state.db.clone(),
        state.event_bus.clone(),
        state.engine.clone(),
    );
    let outcome = tracker
        .finalize(FinalizeIntent {
            job_id: request.job_id,
            correlation_id: request.correlation_id,
            status: request.status,
            rows_total: request.rows_total,
            rows_ok: request.rows_ok,
            rows_error: request.rows_error,
        })
        .await?;

    Ok(Json(FinalizeResponse {
        job_id: outcome.job.job_id,
        status: outcome.job.status.as_str().to_string(),
        already_terminal: outcome.already_terminal,
    }))
}

/// POST /ingest/mapping/{job_id}
///
/// Apply a column mapping to a job awaiting one.
pub async fn apply_mapping(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ApplyMappingRequest>,
) -> ApiResult<Json<ApplyMappingResponse>> {
    let tracker = IngestTracker::new(
        state.db.clone(),
        state.event_bus.clone(),
        state.engine.clone(),
    );
    let mapping = ColumnMapping(request.mapping);
    let mapped_fields: Vec<String> = mapping.0.values().cloned().collect();
    let job = tracker.apply_mapping(job_id, mapping).await?;

    Ok(Json(ApplyMappingResponse {
        job_id: job.job_id,
        status: job.status.as_str().to_string(),
        mapped_fields,
    }))
}

/// Build ingestion routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/session", post(open_session))
        .route("/ingest/status/:job_id", get(get_status))
        .route("/ingest/finalize", post(finalize))
        .route("/ingest/mapping/:job_id", post(apply_mapping))
}
