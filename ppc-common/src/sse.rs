//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for the coordination services.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

use crate::events::EventBus;

/// Create an SSE stream bridging the EventBus to a connected client.
///
/// Sends an initial `ConnectionStatus: connected` event, then forwards every
/// domain event as a JSON-encoded SSE event named after its type tag. Lagged
/// receivers skip dropped events and keep streaming.
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    match serde_json::to_string(&event) {
                        Ok(data) => yield Ok(Event::default().event("CoordEvent").data(data)),
                        Err(e) => {
                            debug!("SSE: failed to serialize event: {}", e);
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("SSE: client lagged, skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
