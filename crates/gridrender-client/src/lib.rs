//! HTTP clients for gridrender.
//!
//! Provides the job submission/status client and the storage download
//! client, each behind a trait so the orchestrator can be driven by fakes.

pub mod error;
pub mod jobs;
pub mod storage;

pub use error::ClientError;
pub use jobs::{JobApi, JobRequest, JobServiceClient, StatusReply};
pub use storage::{ArtifactStore, StorageClient};

/// Header carrying the base64 proxy certificate.
pub const PROXY_HEADER: &str = "PROXY";
