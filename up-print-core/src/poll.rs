//! Job status polling.

use std::fmt;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::{GraphConfig, PollSettings};
use crate::contract::{GraphTransport, ProgressReporter};
use crate::endpoint::EndpointScope;
use crate::error::{PrintError, Result};
use crate::graph_error::translate;

/// Processing state reported by the service for a print job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Paused,
    Stopped,
    Completed,
    Canceled,
    Aborted,
    Failed,
    Unknown(String),
}

impl JobState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => JobState::Pending,
            "processing" => JobState::Processing,
            "paused" => JobState::Paused,
            "stopped" => JobState::Stopped,
            "completed" => JobState::Completed,
            "canceled" | "cancelled" => JobState::Canceled,
            "aborted" => JobState::Aborted,
            "failed" => JobState::Failed,
            _ => JobState::Unknown(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Aborted | JobState::Canceled | JobState::Failed
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Paused => "paused",
            JobState::Stopped => "stopped",
            JobState::Completed => "completed",
            JobState::Canceled => "canceled",
            JobState::Aborted => "aborted",
            JobState::Failed => "failed",
            JobState::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State and optional description from a job payload.
///
/// Looks at `status.state`, `status.processingState`, then top-level
/// `processingState` and `state`.
pub fn extract_job_state(job: &Value) -> (JobState, Option<String>) {
    let status = job.get("status").filter(|s| s.is_object());
    let text = |v: Option<&Value>, key: &str| {
        v.and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let state = text(status, "state")
        .or_else(|| text(status, "processingState"))
        .or_else(|| text(Some(job), "processingState"))
        .or_else(|| text(Some(job), "state"))
        .unwrap_or_else(|| "unknown".to_string());
    (JobState::parse(&state), text(status, "description"))
}

/// Poll `GET {scope}/jobs/{job}` until the job reaches a terminal state.
///
/// Checks run at `settings.interval` until `settings.timeout` elapses, at which
/// point [`PrintError::PollTimeout`] is returned. A timeout says nothing about
/// the job itself, only that its outcome is unknown.
pub async fn poll_until_terminal(
    transport: &dyn GraphTransport,
    config: &GraphConfig,
    scope: &EndpointScope,
    job_id: &str,
    settings: PollSettings,
    progress: &dyn ProgressReporter,
) -> Result<JobState> {
    let url = scope.job_url(config.base(), job_id);
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut last_state = JobState::Unknown("unknown".to_string());

    info!(job_id, scope = %scope, interval = ?settings.interval, timeout = ?settings.timeout, "[POLL] Polling job status");
    while Instant::now() < deadline {
        let response = transport.get(&url, config.timeouts.metadata).await?;
        if response.status != 200 {
            let message = translate("Get job", &response);
            error!(job_id, message = %message, "[POLL] Job status request failed");
            return Err(PrintError::JobStatusFailed(message));
        }
        let body = response
            .json()
            .ok_or_else(|| PrintError::InvalidResponse(format!("job {job_id}: body is not JSON")))?;
        let (state, description) = extract_job_state(&body);
        match &description {
            Some(d) => progress.line(&format!("Job {job_id} state: {state} - {d}")),
            None => progress.line(&format!("Job {job_id} state: {state}")),
        }
        if state.is_terminal() {
            info!(job_id, state = %state, "[POLL] Job reached terminal state");
            return Ok(state);
        }
        last_state = state;
        tokio::time::sleep(settings.interval).await;
    }

    error!(job_id, last_state = %last_state, "[POLL] Timed out waiting for job");
    Err(PrintError::PollTimeout {
        job_id: job_id.to_string(),
        waited: started.elapsed(),
        last_state: last_state.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_status_first() {
        let (state, description) = extract_job_state(&json!({
            "status": {"state": "processing", "description": "Printing page 2"},
            "state": "completed"
        }));
        assert_eq!(state, JobState::Processing);
        assert_eq!(description.as_deref(), Some("Printing page 2"));
    }

    #[test]
    fn falls_back_to_top_level_fields() {
        let (state, _) = extract_job_state(&json!({"processingState": "aborted"}));
        assert_eq!(state, JobState::Aborted);
        assert!(state.is_terminal());

        let (state, description) = extract_job_state(&json!({"id": "j"}));
        assert_eq!(state, JobState::Unknown("unknown".into()));
        assert_eq!(description, None);
    }
}
