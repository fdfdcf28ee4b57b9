use crate::util::{first_i64, first_present, first_str, get_present, scalar_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw job status as reported by the backend. Several synonyms exist across
/// backend versions; [`JobStatus::phase`] collapses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Pending,
    Running,
    Processing,
    Generating,
    Completed,
    Failed,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => JobStatus::Queued,
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "processing" => JobStatus::Processing,
            "generating" => JobStatus::Generating,
            "completed" | "complete" | "done" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    /// Unrecognized statuses count as in progress so that a new backend
    /// status does not break running sessions.
    pub fn phase(&self) -> JobPhase {
        match self {
            JobStatus::Queued | JobStatus::Pending => JobPhase::NotStarted,
            JobStatus::Running
            | JobStatus::Processing
            | JobStatus::Generating
            | JobStatus::Other(_) => JobPhase::InProgress,
            JobStatus::Completed => JobPhase::Completed,
            JobStatus::Failed => JobPhase::Failed,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Processing => "processing",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s.as_str(),
        }
    }
}

/// One report-generation request as seen by the client. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub current_stage: Option<String>,
    pub eta_seconds: Option<u64>,
}

impl Job {
    /// Reads a job record. Returns `None` when the value carries neither a
    /// `status` nor a `completed` flag, i.e. it is not a job at all.
    pub fn from_value(v: &Value) -> Option<Job> {
        if !v.is_object() {
            return None;
        }

        let status = match first_str(v, &["status", "state"]) {
            Some(s) => JobStatus::parse(s),
            None => match get_present(v, "completed").and_then(Value::as_bool) {
                Some(true) => JobStatus::Completed,
                Some(false) => JobStatus::Pending,
                None => return None,
            },
        };

        let progress = match status {
            JobStatus::Completed => 100,
            _ => first_i64(v, &["progress", "percent", "overall_percent"])
                .unwrap_or(0)
                .clamp(0, 100) as u8,
        };

        let error = match status {
            JobStatus::Failed => first_str(v, &["error", "error_message", "errorMessage", "message"])
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            _ => None,
        };

        let result = match status {
            JobStatus::Completed => first_present(v, &["result_json", "result", "resultJson"]).cloned(),
            _ => None,
        };

        Some(Job {
            id: first_present(v, &["id", "job_id", "jobId", "report_id", "reportId"])
                .and_then(scalar_text),
            status,
            progress,
            error,
            result,
            current_stage: first_str(v, &["current_step", "current_stage", "stage"])
                .map(str::to_string),
            eta_seconds: first_i64(v, &["eta_seconds", "etaSeconds", "eta"])
                .map(|s| s.max(0) as u64),
        })
    }

    pub fn phase(&self) -> JobPhase {
        self.status.phase()
    }
}
