//! Event types for the coordination event system
//!
//! Provides shared event definitions and the EventBus used to fan domain
//! events out to SSE subscribers. Events are advisory: emission is
//! fire-and-forget and never affects the outcome of the operation that
//! produced the event. Polling the status endpoints remains the contract;
//! the stream only lets a UI react sooner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Coordination event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoordEvent {
    /// An ingestion session was opened and handed to the workflow engine
    IngestSessionOpened {
        job_id: Uuid,
        correlation_id: Uuid,
        dataset_type: String,
        timestamp: DateTime<Utc>,
    },

    /// An ingestion job changed status (including terminal transitions)
    IngestJobStatusChanged {
        job_id: Uuid,
        old_status: String,
        new_status: String,
        timestamp: DateTime<Utc>,
    },

    /// A column mapping was accepted and dispatched to the workflow engine
    MappingApplied {
        job_id: Uuid,
        mapped_fields: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A committee verdict was recorded
    CommitteeDecisionRecorded {
        decision_id: Uuid,
        rfp_id: Uuid,
        decision: String,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A purchase order was created for an approved RFP
    PurchaseOrderCreated {
        po_id: Uuid,
        rfp_id: Uuid,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for coordination events
///
/// Thin wrapper over `tokio::sync::broadcast`: multi-producer,
/// multi-consumer, lossy for subscribers that fall behind the channel
/// capacity. Slow SSE clients drop old events rather than back-pressuring
/// the services that emit.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoordEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is normal (no UI connected); the send error is
    /// discarded so callers never branch on delivery.
    pub fn emit(&self, event: CoordEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(CoordEvent::IngestJobStatusChanged {
            job_id: Uuid::new_v4(),
            old_status: "running".to_string(),
            new_status: "completed".to_string(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event {
            CoordEvent::IngestJobStatusChanged { new_status, .. } => {
                assert_eq!(new_status, "completed");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(CoordEvent::MappingApplied {
            job_id: Uuid::new_v4(),
            mapped_fields: vec!["company_id".to_string()],
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CoordEvent::PurchaseOrderCreated {
            po_id: Uuid::new_v4(),
            rfp_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PurchaseOrderCreated");
    }
}
