//! Per-unit and per-run outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Artifact, JobId, RenderUnit, UnitFailure};

/// An artifact that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedArtifact {
    pub artifact: Artifact,
    pub error: String,
}

/// Terminal outcome of one render unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Job finished. Downloads are attempted for every artifact.
    Succeeded {
        fetched: Vec<Artifact>,
        failed: Vec<FailedArtifact>,
    },
    /// Job never produced artifacts.
    Failed { reason: UnitFailure },
}

impl UnitOutcome {
    /// Returns true if the job finished.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Outcome of one unit, with the job it ran as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: RenderUnit,
    /// `None` if submission was rejected.
    pub job_id: Option<JobId>,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub units: Vec<UnitReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Start a new, empty report.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            units: Vec::new(),
        }
    }

    /// Record a unit outcome.
    pub fn push(&mut self, report: UnitReport) {
        self.units.push(report);
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Units whose job finished.
    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_success()).count()
    }

    /// Units whose job failed.
    pub fn failed(&self) -> usize {
        self.units.len() - self.succeeded()
    }

    /// Artifacts written locally.
    pub fn fetched_artifacts(&self) -> usize {
        self.downloads().map(|(fetched, _)| fetched).sum()
    }

    /// Artifacts that could not be downloaded.
    pub fn failed_artifacts(&self) -> usize {
        self.downloads().map(|(_, failed)| failed).sum()
    }

    /// Returns true if every unit finished and every artifact was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && self.failed_artifacts() == 0
    }

    fn downloads(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.units.iter().filter_map(|u| match &u.outcome {
            UnitOutcome::Succeeded { fetched, failed } => Some((fetched.len(), failed.len())),
            UnitOutcome::Failed { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(i: u32) -> RenderUnit {
        RenderUnit::for_iteration(i).unwrap()
    }

    #[test]
    fn test_counts() {
        let mut report = RunReport::new();
        report.push(UnitReport {
            unit: unit(1),
            job_id: Some(JobId::new("1")),
            outcome: UnitOutcome::Succeeded {
                fetched: vec![Artifact::new(1, "a001.png").fetched(PathBuf::from("a001.png"), 10)],
                failed: vec![FailedArtifact {
                    artifact: Artifact::new(2, "a002.png"),
                    error: "HTTP 404".into(),
                }],
            },
        });
        report.push(UnitReport {
            unit: unit(2),
            job_id: None,
            outcome: UnitOutcome::Failed {
                reason: UnitFailure::SubmissionRejected { status: 422 },
            },
        });
        report.finish();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.fetched_artifacts(), 1);
        assert_eq!(report.failed_artifacts(), 1);
        assert!(!report.is_complete());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_empty_report_is_complete() {
        assert!(RunReport::new().is_complete());
    }

    #[test]
    fn test_unit_report_json_shape() {
        let report = UnitReport {
            unit: unit(2),
            job_id: Some(JobId::new("77")),
            outcome: UnitOutcome::Failed {
                reason: UnitFailure::PollingFailed { status: 500 },
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["job_id"], "77");
        assert_eq!(json["unit"]["start_frame"], 3);
        assert_eq!(json["reason"]["kind"], "polling_failed");
    }
}
