//! Coordination services
//!
//! The handlers in `api` stay thin; lifecycle writes, the decision sequence,
//! and upstream dispatch live here.

pub mod committee;
pub mod engine;
pub mod recorder;
pub mod tracker;

pub use committee::{DecisionEngine, DecisionOutcome, DecisionRequest};
pub use engine::{EngineClient, SignedUpload};
pub use recorder::EvidenceRecorder;
pub use tracker::{FinalizeIntent, FinalizeOutcome, IngestTracker, OpenSessionOutcome};
