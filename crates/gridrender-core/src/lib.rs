//! gridrender Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - HTTP
//! - SSH
//! - Runtime specifics
//!
//! Everything here is deterministic: frame ranges, batch scripts, artifact
//! names, credential parsing and the job status state machine.

pub mod artifact;
pub mod credential;
pub mod error;
pub mod ids;
pub mod poll;
pub mod report;
pub mod script;
pub mod status;
pub mod submission;
pub mod unit;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactNaming};
pub use credential::{Credential, EncodedProxy, ProxyInfo, ZERO_TIMELEFT};
pub use error::CoreError;
pub use ids::JobId;
pub use poll::{PollLimit, PollPolicy};
pub use report::{FailedArtifact, RunReport, UnitOutcome, UnitReport};
pub use script::ScriptTemplate;
pub use status::{classify_poll, JobState, PollVerdict, UnitFailure};
pub use submission::{JobSubmission, SubmissionState};
pub use unit::{render_units, RenderUnit};
