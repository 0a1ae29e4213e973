//! Domain models for the coordination service

pub mod decision;
pub mod job;
pub mod mapping;

pub use decision::{
    ActorContext, AuditEvent, CommitteeDecision, EvidenceRecord, PoStatus, PurchaseOrder, Verdict,
};
pub use job::{DatasetType, IngestJob, JobStatus};
pub use mapping::{ColumnMapping, MappingValidation};
