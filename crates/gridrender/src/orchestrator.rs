//! Render job orchestration.
//!
//! Units are processed strictly in order: build the script, submit it, poll
//! the job to a terminal state and, on success, download its frames. A
//! failed unit never stops the run; only a missing credential does.

use gridrender_client::{ArtifactStore, ClientError, JobApi, JobRequest};
use gridrender_core::{
    classify_poll, render_units, CoreError, EncodedProxy, FailedArtifact, JobSubmission,
    PollVerdict, RenderUnit, RunReport, UnitFailure, UnitOutcome, UnitReport,
};
use gridrender_remote::{ProxySource, RemoteError};
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::config::RunSettings;
use crate::json_output;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// No usable proxy, or the remote session broke.
    #[error("credential error: {0}")]
    Credential(#[from] RemoteError),

    /// Invalid unit sequence.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Drives every render unit of one run.
pub struct Orchestrator<'a> {
    settings: &'a RunSettings,
    base_request: &'a JobRequest,
    jobs: &'a dyn JobApi,
    store: &'a dyn ArtifactStore,
    proxies: &'a dyn ProxySource,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        settings: &'a RunSettings,
        base_request: &'a JobRequest,
        jobs: &'a dyn JobApi,
        store: &'a dyn ArtifactStore,
        proxies: &'a dyn ProxySource,
    ) -> Self {
        Self {
            settings,
            base_request,
            jobs,
            store,
            proxies,
        }
    }

    /// Process units `1..=settings.units` in order.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let mut report = RunReport::new();
        info!(units = self.settings.units, "Starting render run");

        for unit in render_units(self.settings.units) {
            let unit = unit?;
            info!(
                iteration = unit.iteration,
                frames = %unit,
                "Starting unit"
            );
            json_output::emit_unit_started(&unit);

            // Re-validated per unit so a long run never outlives its proxy.
            let proxy = self.proxies.proxy().await?;

            let unit_report = self.run_unit(unit, &proxy).await;
            match &unit_report.outcome {
                UnitOutcome::Succeeded { fetched, failed } => info!(
                    iteration = unit.iteration,
                    fetched = fetched.len(),
                    failed = failed.len(),
                    "Unit finished"
                ),
                UnitOutcome::Failed { reason } => warn!(
                    iteration = unit.iteration,
                    reason = %reason,
                    "Unit failed"
                ),
            }
            json_output::emit_unit_completed(&unit_report);
            report.push(unit_report);
        }

        report.finish();
        json_output::emit_run_completed(&report);
        Ok(report)
    }

    async fn run_unit(&self, unit: RenderUnit, proxy: &EncodedProxy) -> UnitReport {
        let script = self.settings.template.build_for(&unit);
        let request = self.base_request.with_script(script.as_str());

        let job_id = match self.jobs.submit(&request, proxy).await {
            Ok(job_id) => job_id,
            Err(e) => {
                let reason = match e {
                    ClientError::SubmissionRejected { status, ref body } => {
                        warn!(iteration = unit.iteration, status, body = %body, "Submission rejected");
                        UnitFailure::SubmissionRejected { status }
                    }
                    ClientError::MissingJobId => {
                        warn!(iteration = unit.iteration, "Submission reply has no job id");
                        UnitFailure::MissingJobId
                    }
                    other => UnitFailure::Transport {
                        message: other.to_string(),
                    },
                };
                return UnitReport {
                    unit,
                    job_id: None,
                    outcome: UnitOutcome::Failed { reason },
                };
            }
        };

        info!(iteration = unit.iteration, job_id = %job_id, "Job submitted");
        json_output::emit_job_submitted(&unit, job_id.as_str());

        let mut submission = JobSubmission::new(job_id, unit, script);
        let outcome = match self.poll(&mut submission, proxy).await {
            Ok(()) => self.fetch_artifacts(&unit, proxy).await,
            Err(reason) => UnitOutcome::Failed { reason },
        };

        UnitReport {
            unit,
            job_id: Some(submission.job_id),
            outcome,
        }
    }

    /// Poll until the job reaches a terminal state or the policy gives up.
    async fn poll(
        &self,
        submission: &mut JobSubmission,
        proxy: &EncodedProxy,
    ) -> Result<(), UnitFailure> {
        record_transition(submission.start_polling());

        let policy = self.settings.poll;
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if !policy.allows(attempts, started.elapsed()) {
                warn!(job_id = %submission.job_id, attempts, "Polling gave up");
                record_transition(submission.fail());
                return Err(UnitFailure::PollTimeout { attempts });
            }
            attempts += 1;

            match self.jobs.status(&submission.job_id, proxy).await {
                Ok(reply) => {
                    let state = reply.state.as_ref().map(|s| s.to_string());
                    info!(
                        job_id = %submission.job_id,
                        http_status = reply.http_status,
                        state = state.as_deref().unwrap_or("-"),
                        "Job status"
                    );
                    json_output::emit_job_status(
                        submission.job_id.as_str(),
                        reply.http_status,
                        state.as_deref(),
                        attempts,
                    );

                    match classify_poll(reply.http_status, reply.state.as_ref()) {
                        PollVerdict::Finished => {
                            record_transition(submission.succeed());
                            return Ok(());
                        }
                        PollVerdict::Failed(reason) => {
                            record_transition(submission.fail());
                            return Err(reason);
                        }
                        PollVerdict::Pending => {}
                    }
                }
                Err(e) => {
                    warn!(job_id = %submission.job_id, error = %e, "Status check failed, retrying");
                }
            }

            sleep(policy.interval).await;
        }
    }

    /// Download every frame of a finished unit, in frame order.
    async fn fetch_artifacts(&self, unit: &RenderUnit, proxy: &EncodedProxy) -> UnitOutcome {
        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        let artifacts = self.settings.naming.artifacts_for(unit);
        let count = artifacts.len();

        for (index, artifact) in artifacts.into_iter().enumerate() {
            let dest = self.settings.output_dir.join(&artifact.name);
            match self.store.download(&artifact.name, &dest, proxy).await {
                Ok(size) => {
                    info!(name = %artifact.name, path = %dest.display(), size, "Downloaded");
                    json_output::emit_artifact_fetched(
                        &artifact.name,
                        &dest.display().to_string(),
                        size,
                    );
                    fetched.push(artifact.fetched(dest, size));
                }
                Err(e) => {
                    warn!(name = %artifact.name, error = %e, "Download failed");
                    json_output::emit_artifact_failed(&artifact.name, &e.to_string());
                    failed.push(FailedArtifact {
                        artifact,
                        error: e.to_string(),
                    });
                }
            }

            if index + 1 < count {
                sleep(self.settings.download_interval).await;
            }
        }

        UnitOutcome::Succeeded { fetched, failed }
    }
}

fn record_transition(result: Result<(), CoreError>) {
    if let Err(e) = result {
        error!(error = %e, "Job submission state machine violated");
    }
}
