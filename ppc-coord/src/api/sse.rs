//! Server-Sent Events endpoint
//!
//! Streams domain events to connected UIs. Advisory only; the status
//! endpoints remain the source of truth.

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    ppc_common::sse::create_event_sse_stream("ppc-coord", &state.event_bus)
}
