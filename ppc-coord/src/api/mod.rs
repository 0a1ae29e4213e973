//! HTTP API handlers for ppc-coord

pub mod audit;
pub mod committee;
pub mod health;
pub mod ingest;
pub mod sse;

pub use audit::audit_routes;
pub use committee::committee_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
pub use sse::event_stream;
