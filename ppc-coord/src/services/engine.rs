//! External workflow engine client
//!
//! The engine parses and normalizes uploaded files and computes supplier
//! scoring; this side only announces sessions, dispatches accepted column
//! mappings, and waits for the engine to call back into the finalize
//! endpoint. The engine also brokers the object-storage upload target: the
//! session announcement response carries the signed upload URL.
//!
//! No retries and no polling against the engine; long-running jobs simply
//! stay `running` until the callback arrives.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use ppc_common::{Error, Result};

/// Session announcement sent to the engine on session open
#[derive(Debug, Clone, Serialize)]
pub struct SessionAnnouncement {
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub file_name: String,
    pub file_type: String,
    pub dataset_type: String,
    pub job_id: Uuid,
    pub correlation_id: Uuid,
}

/// Upload target returned by the engine
#[derive(Debug, Clone, Deserialize)]
pub struct SignedUpload {
    pub signed_url: String,
    /// Present once the storage side has confirmed file metadata
    pub upload_id: Option<String>,
}

/// Mapping dispatch sent once a column mapping is accepted
#[derive(Debug, Clone, Serialize)]
pub struct MappingDispatch {
    pub job_id: Uuid,
    pub mapping: BTreeMap<String, String>,
    pub correlation_id: Uuid,
}

/// HTTP client for the external workflow engine
#[derive(Clone)]
pub struct EngineClient {
    http_client: Client,
    base_url: Option<String>,
}

impl EngineClient {
    /// Create a client. A missing base URL is allowed at construction; every
    /// call then fails with a configuration error, which keeps startup
    /// independent of the engine's availability.
    pub fn new(base_url: Option<String>, timeout_ms: u64) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        match &self.base_url {
            Some(base) => Ok(format!("{}{}", base, path)),
            None => Err(Error::Config(
                "Workflow engine endpoint not configured".to_string(),
            )),
        }
    }

    /// Announce a new ingestion session and obtain the upload target
    pub async fn open_session(&self, announcement: &SessionAnnouncement) -> Result<SignedUpload> {
        let url = self.endpoint("/ingest/session")?;

        tracing::debug!(
            job_id = %announcement.job_id,
            dataset_type = %announcement.dataset_type,
            "Announcing ingestion session to workflow engine"
        );

        let response = self
            .http_client
            .post(&url)
            .json(announcement)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Workflow engine unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Workflow engine rejected session announcement: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<SignedUpload>()
            .await
            .map_err(|e| Error::Upstream(format!("Malformed upload target response: {}", e)))
    }

    /// Dispatch an accepted column mapping; the engine resumes processing
    /// and will eventually call back into finalize
    pub async fn dispatch_mapping(&self, dispatch: &MappingDispatch) -> Result<()> {
        let url = self.endpoint("/ingest/mapping")?;

        tracing::debug!(
            job_id = %dispatch.job_id,
            mapped_columns = dispatch.mapping.len(),
            "Dispatching column mapping to workflow engine"
        );

        let response = self
            .http_client
            .post(&url)
            .json(dispatch)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Workflow engine unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Workflow engine rejected mapping dispatch: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}
