//! Ingestion job tracker
//!
//! Owns the job lifecycle from session open through mapping resolution to
//! completion. The external workflow engine does the actual processing and
//! reports back through `finalize`; nothing here blocks on it, and no
//! polling cadence is assumed. A client-driven "force complete" is the same
//! idempotent finalize call the engine uses.

use sqlx::SqlitePool;
use uuid::Uuid;

use ppc_common::events::{CoordEvent, EventBus};
use ppc_common::{ids, time};

use crate::db;
use crate::error::ApiError;
use crate::models::{ActorContext, ColumnMapping, DatasetType, IngestJob, JobStatus};
use crate::services::engine::{EngineClient, MappingDispatch, SessionAnnouncement};
use crate::services::recorder::EvidenceRecorder;

/// Result of opening an ingestion session
#[derive(Debug, Clone)]
pub struct OpenSessionOutcome {
    pub job: IngestJob,
    pub upload_url: String,
}

/// Status report carried by the engine callback (or a force-complete)
#[derive(Debug, Clone, Default)]
pub struct FinalizeIntent {
    pub job_id: Option<String>,
    pub correlation_id: Option<String>,
    /// Reported status; absent means `completed`. `awaiting_mapping` is the
    /// one non-terminal report: the engine parks the job until a mapping
    /// arrives.
    pub status: Option<String>,
    pub rows_total: Option<i64>,
    pub rows_ok: Option<i64>,
    pub rows_error: Option<i64>,
}

/// Result of a finalize call
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub job: IngestJob,
    /// True when the job was already terminal and nothing was written
    pub already_terminal: bool,
}

/// Tracks ingestion jobs against the shared datastore
#[derive(Clone)]
pub struct IngestTracker {
    db: SqlitePool,
    bus: EventBus,
    engine: EngineClient,
    recorder: EvidenceRecorder,
}

impl IngestTracker {
    pub fn new(db: SqlitePool, bus: EventBus, engine: EngineClient) -> Self {
        let recorder = EvidenceRecorder::new(db.clone());
        Self {
            db,
            bus,
            engine,
            recorder,
        }
    }

    /// Open an ingestion session: mint identifiers, register the job as
    /// `running`, and obtain the upload target from the engine.
    ///
    /// The job is registered before the engine is contacted; an upstream
    /// failure surfaces to the caller while the job stays `running`, and the
    /// only way to end it early is an explicit finalize with `failed`.
    pub async fn open_session(
        &self,
        dataset_type: &str,
        file_name: &str,
        content_type: &str,
        actor: &ActorContext,
    ) -> Result<OpenSessionOutcome, ApiError> {
        let dataset_type = DatasetType::parse(dataset_type).ok_or_else(|| {
            ApiError::Validation(format!(
                "Unknown dataset_type {:?} (expected shutdowns, needs, or suppliers)",
                dataset_type
            ))
        })?;

        if file_name.trim().is_empty() {
            return Err(ApiError::Validation("file_name must not be empty".to_string()));
        }
        if content_type.trim().is_empty() {
            return Err(ApiError::Validation(
                "content_type must not be empty".to_string(),
            ));
        }

        let mut job = IngestJob::new(dataset_type);

        db::jobs::insert_job(&self.db, &job)
            .await
            .map_err(|e| ApiError::Persistence(format!("insert_job: {}", e)))?;

        let announcement = SessionAnnouncement {
            company_id: actor.company_id.clone(),
            user_id: actor.user_id.clone(),
            file_name: file_name.to_string(),
            file_type: content_type.to_string(),
            dataset_type: dataset_type.as_str().to_string(),
            job_id: job.job_id,
            correlation_id: job.correlation_id,
        };

        let upload = self.engine.open_session(&announcement).await?;

        if upload.upload_id.is_some() {
            job.upload_id = upload.upload_id.clone();
            db::jobs::update_job(&self.db, &job)
                .await
                .map_err(|e| ApiError::Persistence(format!("update_job: {}", e)))?;
        }

        tracing::info!(
            job_id = %job.job_id,
            correlation_id = %job.correlation_id,
            dataset_type = %dataset_type.as_str(),
            "Ingestion session opened"
        );

        self.bus.emit(CoordEvent::IngestSessionOpened {
            job_id: job.job_id,
            correlation_id: job.correlation_id,
            dataset_type: dataset_type.as_str().to_string(),
            timestamp: time::now(),
        });

        self.recorder
            .record_audit_event(
                job.correlation_id,
                "ingest_session_opened",
                Some("ingest_job"),
                Some(&job.job_id.to_string()),
                Some(format!("{} upload session opened", dataset_type.as_str())),
                None,
                actor,
            )
            .await;

        Ok(OpenSessionOutcome {
            job,
            upload_url: upload.signed_url,
        })
    }

    /// Read-only status lookup
    pub async fn get_status(&self, job_id: Uuid) -> Result<IngestJob, ApiError> {
        db::jobs::load_job(&self.db, job_id)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFound(format!("Ingestion job not found: {}", job_id)))
    }

    /// Apply a status report from the engine callback (or a client's force
    /// complete). Idempotent: a job that is already terminal is returned
    /// as-is without mutation, whatever the new intent says.
    ///
    /// Lookup prefers `job_id`; a `correlation_id` resolves to the most
    /// recently started job carrying it.
    pub async fn finalize(&self, intent: FinalizeIntent) -> Result<FinalizeOutcome, ApiError> {
        let target_status = match intent.status.as_deref() {
            None | Some("completed") => JobStatus::Completed,
            Some("error") => JobStatus::Error,
            Some("failed") => JobStatus::Failed,
            Some("awaiting_mapping") => JobStatus::AwaitingMapping,
            Some(other) => {
                return Err(ApiError::Validation(format!(
                    "Unknown finalize status {:?} (expected completed, error, failed, or awaiting_mapping)",
                    other
                )))
            }
        };

        validate_row_counts(&intent)?;

        let mut job = self.resolve_job(&intent).await?;

        if job.is_terminal() {
            tracing::debug!(
                job_id = %job.job_id,
                status = %job.status.as_str(),
                "Finalize on already-terminal job; reporting existing status"
            );
            return Ok(FinalizeOutcome {
                job,
                already_terminal: true,
            });
        }

        let old_status = job.status;

        if let Some(total) = intent.rows_total {
            job.rows_total = Some(total);
        }
        if let Some(ok) = intent.rows_ok {
            job.rows_ok = Some(ok);
        }
        if let Some(err) = intent.rows_error {
            job.rows_error = Some(err);
        }

        job.transition_to(target_status);

        db::jobs::update_job(&self.db, &job)
            .await
            .map_err(|e| ApiError::Persistence(format!("update_job: {}", e)))?;

        tracing::info!(
            job_id = %job.job_id,
            old_status = %old_status.as_str(),
            new_status = %job.status.as_str(),
            rows_total = ?job.rows_total,
            "Ingestion job status reported"
        );

        self.bus.emit(CoordEvent::IngestJobStatusChanged {
            job_id: job.job_id,
            old_status: old_status.as_str().to_string(),
            new_status: job.status.as_str().to_string(),
            timestamp: time::now(),
        });

        let event_type = if job.is_terminal() {
            "ingest_job_finalized"
        } else {
            "ingest_mapping_required"
        };
        self.recorder
            .record_audit_event(
                job.correlation_id,
                event_type,
                Some("ingest_job"),
                Some(&job.job_id.to_string()),
                Some(format!("status {}", job.status.as_str())),
                None,
                &ActorContext::default(),
            )
            .await;

        Ok(FinalizeOutcome {
            job,
            already_terminal: false,
        })
    }

    /// Move a job out of `awaiting_mapping` and back to the engine. Only
    /// valid in `awaiting_mapping`; the mapping is re-validated here no
    /// matter what any earlier validation call reported.
    pub async fn apply_mapping(
        &self,
        job_id: Uuid,
        mapping: ColumnMapping,
    ) -> Result<IngestJob, ApiError> {
        let mut job = self.get_status(job_id).await?;

        if job.status != JobStatus::AwaitingMapping {
            return Err(ApiError::State(format!(
                "Job {} is {} but mapping requires awaiting_mapping",
                job.job_id,
                job.status.as_str()
            )));
        }

        let validation = crate::models::mapping::validate(&mapping, job.dataset_type);
        if !validation.valid {
            return Err(ApiError::Validation(format!(
                "Mapping is missing required fields: {}",
                validation.missing.join(", ")
            )));
        }

        self.engine
            .dispatch_mapping(&MappingDispatch {
                job_id: job.job_id,
                mapping: mapping.0.clone(),
                correlation_id: job.correlation_id,
            })
            .await?;

        db::jobs::save_mapping(&self.db, job.job_id, &mapping)
            .await
            .map_err(|e| ApiError::Persistence(format!("save_mapping: {}", e)))?;

        job.transition_to(JobStatus::Running);
        db::jobs::update_job(&self.db, &job)
            .await
            .map_err(|e| ApiError::Persistence(format!("update_job: {}", e)))?;

        let mapped_fields: Vec<String> = mapping.0.values().cloned().collect();
        tracing::info!(
            job_id = %job.job_id,
            mapped_fields = ?mapped_fields,
            "Column mapping applied; job handed back to engine"
        );

        self.bus.emit(CoordEvent::MappingApplied {
            job_id: job.job_id,
            mapped_fields,
            timestamp: time::now(),
        });

        self.recorder
            .record_audit_event(
                job.correlation_id,
                "mapping_applied",
                Some("ingest_job"),
                Some(&job.job_id.to_string()),
                Some("column mapping accepted and dispatched".to_string()),
                None,
                &ActorContext::default(),
            )
            .await;

        Ok(job)
    }

    /// Normalize the dual-identifier finalize lookup into one job.
    async fn resolve_job(&self, intent: &FinalizeIntent) -> Result<IngestJob, ApiError> {
        if intent.job_id.is_none() && intent.correlation_id.is_none() {
            return Err(ApiError::Validation(
                "finalize requires job_id or correlation_id".to_string(),
            ));
        }

        if let Some(raw) = intent.job_id.as_deref() {
            let job_id = ids::parse(raw.trim())
                .map_err(|_| ApiError::Validation(format!("Malformed job_id: {:?}", raw)))?;
            if let Some(job) = db::jobs::load_job(&self.db, job_id).await? {
                return Ok(job);
            }
        }

        if let Some(raw) = intent.correlation_id.as_deref() {
            let correlation_id = ids::parse(raw.trim()).map_err(|_| {
                ApiError::Validation(format!("Malformed correlation_id: {:?}", raw))
            })?;
            if let Some(job) = db::jobs::find_by_correlation(&self.db, correlation_id).await? {
                return Ok(job);
            }
        }

        Err(ApiError::NotFound(
            "No ingestion job matches the supplied identifiers".to_string(),
        ))
    }
}

fn validate_row_counts(intent: &FinalizeIntent) -> Result<(), ApiError> {
    for (name, value) in [
        ("rows_total", intent.rows_total),
        ("rows_ok", intent.rows_ok),
        ("rows_error", intent.rows_error),
    ] {
        if let Some(v) = value {
            if v < 0 {
                return Err(ApiError::Validation(format!(
                    "{} must be non-negative, got {}",
                    name, v
                )));
            }
        }
    }

    if let (Some(total), Some(ok), Some(err)) =
        (intent.rows_total, intent.rows_ok, intent.rows_error)
    {
        if ok + err > total {
            return Err(ApiError::Validation(format!(
                "rows_ok + rows_error ({} + {}) exceeds rows_total ({})",
                ok, err, total
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_tracker() -> (IngestTracker, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ppc_common::db::init::create_schema(&pool).await.unwrap();
        let bus = EventBus::new(16);
        let engine = EngineClient::new(None, 1000).unwrap();
        (IngestTracker::new(pool.clone(), bus, engine), pool)
    }

    async fn seeded_job(pool: &SqlitePool, status: JobStatus) -> IngestJob {
        let mut job = IngestJob::new(DatasetType::Needs);
        job.status = status;
        db::jobs::insert_job(pool, &job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_open_session_rejects_unknown_dataset_type() {
        let (tracker, _pool) = test_tracker().await;
        let result = tracker
            .open_session("inventory", "file.csv", "text/csv", &ActorContext::default())
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_open_session_rejects_empty_file_name() {
        let (tracker, _pool) = test_tracker().await;
        let result = tracker
            .open_session("needs", "  ", "text/csv", &ActorContext::default())
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_open_session_without_engine_is_configuration_error() {
        let (tracker, pool) = test_tracker().await;
        let result = tracker
            .open_session("needs", "needs.csv", "text/csv", &ActorContext::default())
            .await;
        assert!(matches!(result, Err(ApiError::Configuration(_))));

        // The job was registered before the engine call and stays running
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingest_jobs WHERE status = 'running'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_finalize_completes_running_job() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        let outcome = tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("completed".to_string()),
                rows_total: Some(100),
                rows_ok: Some(95),
                rows_error: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!outcome.already_terminal);
        assert_eq!(outcome.job.status, JobStatus::Completed);
        assert_eq!(outcome.job.rows_total, Some(100));
        assert!(outcome.job.ended_at.is_some());

        let loaded = tracker.get_status(job.job_id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.rows_ok, Some(95));
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        let intent = FinalizeIntent {
            job_id: Some(job.job_id.to_string()),
            status: Some("completed".to_string()),
            rows_total: Some(10),
            rows_ok: Some(10),
            rows_error: Some(0),
            ..Default::default()
        };

        let first = tracker.finalize(intent.clone()).await.unwrap();
        assert!(!first.already_terminal);

        let second = tracker.finalize(intent).await.unwrap();
        assert!(second.already_terminal);
        assert_eq!(second.job.status, JobStatus::Completed);
        assert_eq!(second.job.ended_at, first.job.ended_at);
    }

    #[tokio::test]
    async fn test_finalize_on_terminal_job_ignores_new_intent() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("completed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        // A late "failed" report must not flip the terminal status
        let outcome = tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("failed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(outcome.already_terminal);
        assert_eq!(outcome.job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_finalize_by_correlation_prefers_most_recent_job() {
        let (tracker, pool) = test_tracker().await;

        let mut older = IngestJob::new(DatasetType::Needs);
        let correlation_id = older.correlation_id;
        older.started_at = time::now() - chrono::Duration::minutes(10);
        db::jobs::insert_job(&pool, &older).await.unwrap();

        let mut newer = IngestJob::new(DatasetType::Needs);
        newer.correlation_id = correlation_id;
        db::jobs::insert_job(&pool, &newer).await.unwrap();

        let outcome = tracker
            .finalize(FinalizeIntent {
                correlation_id: Some(correlation_id.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.job.job_id, newer.job_id);
        assert_eq!(outcome.job.status, JobStatus::Completed);

        // The older job is untouched
        let untouched = tracker.get_status(older.job_id).await.unwrap();
        assert_eq!(untouched.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_finalize_prefers_job_id_over_correlation() {
        let (tracker, pool) = test_tracker().await;
        let by_job = seeded_job(&pool, JobStatus::Running).await;
        let other = seeded_job(&pool, JobStatus::Running).await;

        let outcome = tracker
            .finalize(FinalizeIntent {
                job_id: Some(by_job.job_id.to_string()),
                correlation_id: Some(other.correlation_id.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.job.job_id, by_job.job_id);
    }

    #[tokio::test]
    async fn test_finalize_without_identifiers_is_validation_error() {
        let (tracker, _pool) = test_tracker().await;
        let result = tracker.finalize(FinalizeIntent::default()).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_finalize_unknown_identifiers_is_not_found() {
        let (tracker, _pool) = test_tracker().await;
        let result = tracker
            .finalize(FinalizeIntent {
                job_id: Some(Uuid::new_v4().to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_finalize_rejects_inconsistent_row_counts() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        let result = tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                rows_total: Some(10),
                rows_ok: Some(9),
                rows_error: Some(2),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_finalize_error_status_is_terminal() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::AwaitingMapping).await;

        let outcome = tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("error".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.job.status, JobStatus::Error);
        assert!(outcome.job.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_callback_can_park_job_awaiting_mapping() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        let outcome = tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("awaiting_mapping".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!outcome.already_terminal);
        assert_eq!(outcome.job.status, JobStatus::AwaitingMapping);
        assert!(outcome.job.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_apply_mapping_requires_awaiting_state() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        let mapping = ColumnMapping(
            [("a".to_string(), "company_id".to_string())].into_iter().collect(),
        );
        let result = tracker.apply_mapping(job.job_id, mapping).await;
        assert!(matches!(result, Err(ApiError::State(_))));
    }

    #[tokio::test]
    async fn test_apply_mapping_revalidates_and_lists_missing() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::AwaitingMapping).await;

        let mapping = ColumnMapping(
            [
                ("colA".to_string(), "company_id".to_string()),
                ("colB".to_string(), "item_name".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        match tracker.apply_mapping(job.job_id, mapping).await {
            Err(ApiError::Validation(msg)) => {
                assert!(msg.contains("item_category"));
                assert!(msg.contains("quantity"));
            }
            other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
        }

        // Dispatch never happened; the job still awaits its mapping
        let unchanged = tracker.get_status(job.job_id).await.unwrap();
        assert_eq!(unchanged.status, JobStatus::AwaitingMapping);
    }

    #[tokio::test]
    async fn test_apply_mapping_unknown_job_is_not_found() {
        let (tracker, _pool) = test_tracker().await;
        let result = tracker
            .apply_mapping(Uuid::new_v4(), ColumnMapping::default())
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_scenario_needs_100_rows() {
        let (tracker, pool) = test_tracker().await;
        let job = seeded_job(&pool, JobStatus::Running).await;

        tracker
            .finalize(FinalizeIntent {
                job_id: Some(job.job_id.to_string()),
                status: Some("completed".to_string()),
                rows_total: Some(100),
                rows_ok: Some(95),
                rows_error: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();

        let status = tracker.get_status(job.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.rows_total, Some(100));
        assert_eq!(status.rows_ok, Some(95));
        assert_eq!(status.rows_error, Some(5));
    }
}
