//! JSON output for streaming run events to stdout.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use gridrender_core::{RenderUnit, RunReport, UnitReport};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    UnitStarted,
    JobSubmitted,
    JobStatus,
    ArtifactFetched,
    ArtifactFailed,
    UnitCompleted,
    RunCompleted,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

/// Emit a unit_started event.
pub fn emit_unit_started(unit: &RenderUnit) {
    JsonEvent::new(
        JsonEventType::UnitStarted,
        serde_json::json!({
            "iteration": unit.iteration,
            "start_frame": unit.start_frame,
            "end_frame": unit.end_frame,
        }),
    )
    .emit();
}

/// Emit a job_submitted event.
pub fn emit_job_submitted(unit: &RenderUnit, job_id: &str) {
    JsonEvent::new(
        JsonEventType::JobSubmitted,
        serde_json::json!({
            "iteration": unit.iteration,
            "job_id": job_id,
        }),
    )
    .emit();
}

/// Emit a job_status event.
pub fn emit_job_status(job_id: &str, http_status: u16, state: Option<&str>, attempt: u32) {
    JsonEvent::new(
        JsonEventType::JobStatus,
        serde_json::json!({
            "job_id": job_id,
            "http_status": http_status,
            "state": state,
            "attempt": attempt,
        }),
    )
    .emit();
}

/// Emit an artifact_fetched event.
pub fn emit_artifact_fetched(name: &str, path: &str, size_bytes: u64) {
    JsonEvent::new(
        JsonEventType::ArtifactFetched,
        serde_json::json!({
            "name": name,
            "path": path,
            "size_bytes": size_bytes,
        }),
    )
    .emit();
}

/// Emit an artifact_failed event.
pub fn emit_artifact_failed(name: &str, error: &str) {
    JsonEvent::new(
        JsonEventType::ArtifactFailed,
        serde_json::json!({
            "name": name,
            "error": error,
        }),
    )
    .emit();
}

/// Emit a unit_completed event carrying the unit's outcome.
pub fn emit_unit_completed(report: &UnitReport) {
    let data = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
    JsonEvent::new(JsonEventType::UnitCompleted, data).emit();
}

/// Emit a run_completed event with totals.
pub fn emit_run_completed(report: &RunReport) {
    JsonEvent::new(
        JsonEventType::RunCompleted,
        serde_json::json!({
            "started_at": report.started_at.to_rfc3339(),
            "finished_at": report.finished_at.map(|t| t.to_rfc3339()),
            "units": report.units.len(),
            "succeeded": report.succeeded(),
            "failed": report.failed(),
            "artifacts_fetched": report.fetched_artifacts(),
            "artifacts_failed": report.failed_artifacts(),
        }),
    )
    .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let event = JsonEvent::new(
            JsonEventType::JobStatus,
            serde_json::json!({"job_id": "1", "state": "RUNNING"}),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "job_status");
        assert_eq!(json["data"]["state"], "RUNNING");
        assert!(json["timestamp"].as_str().is_some());
    }
}
