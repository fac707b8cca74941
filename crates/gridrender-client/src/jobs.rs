//! Job submission and status client.

use async_trait::async_trait;
use gridrender_core::{EncodedProxy, JobId, JobState};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::PROXY_HEADER;

/// Body of a job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    /// Cluster login host the job runs on.
    pub host: String,
    /// Directory the job starts in.
    pub working_directory: String,
    /// Batch script.
    pub script: String,
}

impl JobRequest {
    /// Create a request with an empty script.
    pub fn new(host: impl Into<String>, working_directory: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            working_directory: working_directory.into(),
            script: String::new(),
        }
    }

    /// Copy of this request carrying `script`.
    pub fn with_script(&self, script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..self.clone()
        }
    }
}

/// One answer from the job status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    /// HTTP status code.
    pub http_status: u16,
    /// Reported state, if the body carried one.
    pub state: Option<JobState>,
}

/// Job service operations used by the orchestrator.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Submit a job. Only HTTP 201 with a `job_id` counts as accepted.
    async fn submit(&self, request: &JobRequest, proxy: &EncodedProxy)
        -> Result<JobId, ClientError>;

    /// Check a job's status. Any HTTP status is returned, not raised.
    async fn status(&self, job_id: &JobId, proxy: &EncodedProxy)
        -> Result<StatusReply, ClientError>;
}

/// HTTP client for the job service (`POST {base}`, `GET {base}/{job_id}`).
pub struct JobServiceClient {
    inner: reqwest::Client,
    base_url: String,
}

impl JobServiceClient {
    /// Create a client for the jobs collection at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_client(inner: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn status_url(&self, job_id: &JobId) -> String {
        format!("{}/{}", self.base_url, job_id)
    }
}

/// Extract `job_id`, which the service may send as a string or a number.
fn parse_job_id(body: &Value) -> Option<JobId> {
    match body.get("job_id")? {
        Value::String(s) if !s.is_empty() => Some(JobId::new(s.as_str())),
        Value::Number(n) => Some(JobId::new(n.to_string())),
        _ => None,
    }
}

#[async_trait]
impl JobApi for JobServiceClient {
    async fn submit(
        &self,
        request: &JobRequest,
        proxy: &EncodedProxy,
    ) -> Result<JobId, ClientError> {
        debug!(url = %self.base_url, host = %request.host, "POST job");

        let response = self
            .inner
            .post(&self.base_url)
            .header(PROXY_HEADER, proxy.as_str())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::SubmissionRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        parse_job_id(&body).ok_or(ClientError::MissingJobId)
    }

    async fn status(
        &self,
        job_id: &JobId,
        proxy: &EncodedProxy,
    ) -> Result<StatusReply, ClientError> {
        let url = self.status_url(job_id);
        debug!(url = %url, "GET job status");

        let response = self
            .inner
            .get(&url)
            .header(PROXY_HEADER, proxy.as_str())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let http_status = response.status().as_u16();
        let body = response.text().await?;
        let state = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("status").and_then(Value::as_str).map(JobState::parse));

        Ok(StatusReply { http_status, state })
    }
}
