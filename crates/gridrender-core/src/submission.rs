//! Lifecycle of a submitted render job.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, JobId, RenderUnit};

/// Where a submitted job is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Accepted by the job service, not yet polled.
    #[default]
    Submitted,
    /// Status checks in progress.
    Polling,
    /// Job finished; artifacts may be fetched.
    Succeeded,
    /// Job failed or polling gave up.
    Failed,
}

impl SubmissionState {
    fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Submitted, Polling) | (Submitted, Failed) | (Polling, Succeeded) | (Polling, Failed)
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "SUBMITTED",
            Self::Polling => "POLLING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// A job accepted by the job service for one render unit.
///
/// Submissions only move forward; a failed job is never resubmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub job_id: JobId,
    pub unit: RenderUnit,
    pub script: String,
    state: SubmissionState,
}

impl JobSubmission {
    /// Record a freshly accepted job.
    pub fn new(job_id: JobId, unit: RenderUnit, script: impl Into<String>) -> Self {
        Self {
            job_id,
            unit,
            script: script.into(),
            state: SubmissionState::Submitted,
        }
    }

    /// Current state.
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// SUBMITTED -> POLLING.
    pub fn start_polling(&mut self) -> Result<(), CoreError> {
        self.transition(SubmissionState::Polling)
    }

    /// POLLING -> SUCCEEDED.
    pub fn succeed(&mut self) -> Result<(), CoreError> {
        self.transition(SubmissionState::Succeeded)
    }

    /// SUBMITTED | POLLING -> FAILED.
    pub fn fail(&mut self) -> Result<(), CoreError> {
        self.transition(SubmissionState::Failed)
    }

    fn transition(&mut self, next: SubmissionState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
