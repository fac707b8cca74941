//! Job states reported by the job service and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// HTTP statuses that end polling with a failure.
pub const TERMINAL_FAILURE_CODES: [u16; 4] = [401, 403, 404, 500];

/// State string reported by the job status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Aborted,
    Error,
    /// Any state this client does not know about.
    Other(String),
}

impl JobState {
    /// Parse a reported state. Matching is exact, as the service reports it.
    pub fn parse(value: &str) -> Self {
        match value {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "FINISHED" => Self::Finished,
            "ABORTED" => Self::Aborted,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if the job failed on the service side.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Aborted | Self::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::Error => write!(f, "ERROR"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Why a render unit ended without its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitFailure {
    /// Submission answered with something other than 201.
    #[error("job submission rejected with HTTP {status}")]
    SubmissionRejected { status: u16 },

    /// Submission accepted with 201 but the reply carried no usable `job_id`.
    #[error("job service accepted the submission without a job id")]
    MissingJobId,

    /// Status endpoint answered with a terminal failure code.
    #[error("job polling failed with HTTP {status}")]
    PollingFailed { status: u16 },

    /// The job service reports the job as failed.
    #[error("job ended in state {state}")]
    JobAborted { state: String },

    /// Poll policy exhausted before a terminal state.
    #[error("job did not finish after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    /// Network or protocol error talking to the job service.
    #[error("transport error: {message}")]
    Transport { message: String },
}

/// What one status check means for the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    /// Not terminal yet; poll again.
    Pending,
    /// Job finished; fetch artifacts.
    Finished,
    /// Job failed; give up on this unit.
    Failed(UnitFailure),
}

/// Classify one status response.
///
/// `state` is `None` when the body could not be read or had no `status` field.
pub fn classify_poll(http_status: u16, state: Option<&JobState>) -> PollVerdict {
    if TERMINAL_FAILURE_CODES.contains(&http_status) {
        return PollVerdict::Failed(UnitFailure::PollingFailed {
            status: http_status,
        });
    }
    if http_status != 200 {
        return PollVerdict::Pending;
    }
    match state {
        Some(JobState::Finished) => PollVerdict::Finished,
        Some(s) if s.is_failure() => PollVerdict::Failed(UnitFailure::JobAborted {
            state: s.to_string(),
        }),
        _ => PollVerdict::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state() {
        assert_eq!(JobState::parse("FINISHED"), JobState::Finished);
        assert_eq!(JobState::parse("finished"), JobState::Other("finished".into()));
        assert_eq!(JobState::parse("RUNNING").to_string(), "RUNNING");
    }

    #[test]
    fn test_terminal_failure_codes() {
        for code in [401, 403, 404, 500] {
            assert_eq!(
                classify_poll(code, Some(&JobState::Finished)),
                PollVerdict::Failed(UnitFailure::PollingFailed { status: code })
            );
        }
    }

    #[test]
    fn test_finished_only_on_200() {
        assert_eq!(classify_poll(200, Some(&JobState::Finished)), PollVerdict::Finished);
        assert_eq!(classify_poll(202, Some(&JobState::Finished)), PollVerdict::Pending);
        assert_eq!(classify_poll(502, None), PollVerdict::Pending);
    }

    #[test]
    fn test_non_terminal_states_keep_polling() {
        assert_eq!(classify_poll(200, Some(&JobState::Queued)), PollVerdict::Pending);
        assert_eq!(classify_poll(200, Some(&JobState::Running)), PollVerdict::Pending);
        assert_eq!(
            classify_poll(200, Some(&JobState::Other("NEW".into()))),
            PollVerdict::Pending
        );
        assert_eq!(classify_poll(200, None), PollVerdict::Pending);
    }

    #[test]
    fn test_service_side_failure() {
        assert_eq!(
            classify_poll(200, Some(&JobState::Aborted)),
            PollVerdict::Failed(UnitFailure::JobAborted {
                state: "ABORTED".into()
            })
        );
    }

    #[test]
    fn test_failure_serialization() {
        let json = serde_json::to_value(UnitFailure::PollingFailed { status: 500 }).unwrap();
        assert_eq!(json["kind"], "polling_failed");
        assert_eq!(json["status"], 500);

        let json = serde_json::to_value(UnitFailure::MissingJobId).unwrap();
        assert_eq!(json["kind"], "missing_job_id");
    }
}
