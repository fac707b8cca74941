//! Error types for the HTTP clients.

use thiserror::Error;

/// Errors that can occur when talking to the job service or storage.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Job service did not accept the submission.
    #[error("job submission rejected: HTTP {status}: {body}")]
    SubmissionRejected { status: u16, body: String },

    /// Job service accepted the submission but returned no job id.
    #[error("job submission response has no job_id")]
    MissingJobId,

    /// Storage did not serve the requested file.
    #[error("download of {name} failed: HTTP {status}")]
    DownloadFailed { name: String, status: u16 },

    /// Local file error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
