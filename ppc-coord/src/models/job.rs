//! Ingestion job lifecycle state machine
//!
//! A job tracks one upload from session open to completion:
//! `running → awaiting_mapping → running → completed`, with `error`/`failed`
//! reachable from any non-terminal state. The external workflow engine owns
//! the processing; this side only records what it reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dataset a job ingests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    /// Planned plant shutdown windows
    Shutdowns,
    /// Purchase needs per company
    Needs,
    /// Supplier master data
    Suppliers,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Shutdowns => "shutdowns",
            DatasetType::Needs => "needs",
            DatasetType::Suppliers => "suppliers",
        }
    }

    /// Parse a caller-supplied dataset type string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shutdowns" => Some(DatasetType::Shutdowns),
            "needs" => Some(DatasetType::Needs),
            "suppliers" => Some(DatasetType::Suppliers),
            _ => None,
        }
    }
}

/// Ingestion job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// With the workflow engine (initial state, and again after mapping)
    Running,
    /// Engine detected unknown columns; waiting for a mapping from the caller
    AwaitingMapping,
    /// Processed successfully
    Completed,
    /// Engine reported a data-level error
    Error,
    /// Engine reported a processing failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::AwaitingMapping => "awaiting_mapping",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobStatus::Running),
            "awaiting_mapping" => Some(JobStatus::AwaitingMapping),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Failed
        )
    }
}

/// One upload-to-completion lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    /// Unique job identifier (immutable)
    pub job_id: Uuid,

    /// Links the job to its audit trail (assigned at creation, immutable)
    pub correlation_id: Uuid,

    /// Set once file metadata is confirmed by the storage side
    pub upload_id: Option<String>,

    /// Fixed at creation
    pub dataset_type: DatasetType,

    pub status: JobStatus,

    /// Row counts reported by the engine's finalize callback
    pub rows_total: Option<i64>,
    pub rows_ok: Option<i64>,
    pub rows_error: Option<i64>,

    pub started_at: DateTime<Utc>,

    /// Set iff status is terminal
    pub ended_at: Option<DateTime<Utc>>,
}

impl IngestJob {
    /// Create a new job in `running` with freshly minted identifiers
    pub fn new(dataset_type: DatasetType) -> Self {
        Self {
            job_id: ppc_common::ids::new_job_id(),
            correlation_id: ppc_common::ids::new_correlation_id(),
            upload_id: None,
            dataset_type,
            status: JobStatus::Running,
            rows_total: None,
            rows_ok: None,
            rows_error: None,
            started_at: ppc_common::time::now(),
            ended_at: None,
        }
    }

    /// Transition to a new status, stamping `ended_at` on terminal states
    pub fn transition_to(&mut self, new_status: JobStatus) {
        self.status = new_status;
        if new_status.is_terminal() {
            if self.ended_at.is_none() {
                self.ended_at = Some(ppc_common::time::now());
            }
        } else {
            self.ended_at = None;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Row counts must satisfy ok + error <= total whenever all are present
    pub fn row_counts_consistent(&self) -> bool {
        match (self.rows_total, self.rows_ok, self.rows_error) {
            (Some(total), Some(ok), Some(err)) => ok >= 0 && err >= 0 && ok + err <= total,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_running() {
        let job = IngestJob::new(DatasetType::Needs);
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.ended_at.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_terminal_transition_sets_ended_at() {
        let mut job = IngestJob::new(DatasetType::Suppliers);
        job.transition_to(JobStatus::Completed);
        assert!(job.is_terminal());
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_mapping_round_trip_clears_ended_at() {
        let mut job = IngestJob::new(DatasetType::Needs);
        job.transition_to(JobStatus::AwaitingMapping);
        assert!(job.ended_at.is_none());
        job.transition_to(JobStatus::Running);
        assert!(job.ended_at.is_none());
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn test_error_and_failed_are_terminal() {
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::AwaitingMapping.is_terminal());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            JobStatus::Running,
            JobStatus::AwaitingMapping,
            JobStatus::Completed,
            JobStatus::Error,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("paused"), None);
    }

    #[test]
    fn test_dataset_type_parse() {
        assert_eq!(DatasetType::parse("needs"), Some(DatasetType::Needs));
        assert_eq!(DatasetType::parse("inventory"), None);
    }

    #[test]
    fn test_row_count_invariant() {
        let mut job = IngestJob::new(DatasetType::Needs);
        assert!(job.row_counts_consistent());

        job.rows_total = Some(100);
        job.rows_ok = Some(95);
        job.rows_error = Some(5);
        assert!(job.row_counts_consistent());

        job.rows_error = Some(6);
        assert!(!job.row_counts_consistent());
    }
}
