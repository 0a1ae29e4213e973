//! ppc-coord library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use ppc_common::events::EventBus;

use crate::services::EngineClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Workflow engine client
    pub engine: EngineClient,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, engine: EngineClient) -> Self {
        Self {
            db,
            event_bus,
            engine,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ingest_routes())
        .merge(api::committee_routes())
        .merge(api::audit_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
