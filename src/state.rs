//! Job status state machine.
//!
//! ```text
//! Loading ──► Generating ──► Completed
//!    │            │ ▲
//!    │            └─┘ (every in-progress tick)
//!    └────────────┴────────► Error
//! ```
//!
//! Every update is a whole-value replacement computed from the most recent
//! observation. `Completed` and `Error` absorb everything that arrives later.

use crate::{
    api::ApiError,
    job::{Job, JobPhase, JobStatus},
    normalize::normalize,
    progress::ProgressSnapshot,
    report::Report,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const GENERIC_JOB_FAILURE: &str = "Report generation failed. Please try again in a moment.";
pub const MALFORMED_RESPONSE: &str = "The server returned a response without a job status.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    Live,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratingView {
    pub job_id: String,
    pub status: JobStatus,
    pub percent: u8,
    pub snapshot: ProgressSnapshot,
    pub connection: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidLink,
    InvalidToken,
    Timeout,
    Transport,
    MalformedResponse,
    JobFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeAction {
    Retry,
    GoHome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
    pub actions: Vec<EscapeAction>,
    /// Raw response for the collapsed debug panel.
    pub detail: Option<Value>,
}

impl ErrorView {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            actions: vec![EscapeAction::Retry, EscapeAction::GoHome],
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn from_api(err: &ApiError) -> Self {
        let kind = match err {
            ApiError::InvalidLink(_) => ErrorKind::InvalidLink,
            ApiError::InvalidToken => ErrorKind::InvalidToken,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Decode(_) => ErrorKind::MalformedResponse,
            _ => ErrorKind::Transport,
        };
        Self::new(kind, err.to_string())
    }

    pub fn job_failed(message: Option<&str>) -> Self {
        Self::new(ErrorKind::JobFailed, message.unwrap_or(GENERIC_JOB_FAILURE))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewState {
    Loading,
    Generating(GeneratingView),
    Completed(Box<Report>),
    Error(ErrorView),
}

impl ViewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewState::Completed(_) | ViewState::Error(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Generating(_) => "generating",
            ViewState::Completed(_) => "completed",
            ViewState::Error(_) => "error",
        }
    }
}

/// What the transport should do after an update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    FetchResult,
    Stop,
}

/// Owns the view state for one job.
#[derive(Debug, Clone)]
pub struct ReportSession {
    job_id: String,
    state: ViewState,
}

impl ReportSession {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: ViewState::Loading,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// First fetch of the session. Failure here is fatal to the view.
    pub fn apply_initial(&mut self, outcome: Result<Value, ApiError>) -> Directive {
        match outcome {
            Ok(raw) => match self.apply_response(&raw) {
                Some(directive) => directive,
                None => {
                    let view = ErrorView::new(ErrorKind::MalformedResponse, MALFORMED_RESPONSE);
                    self.fail(view.with_detail(raw));
                    Directive::Stop
                }
            },
            Err(err) => {
                self.fail(ErrorView::from_api(&err));
                Directive::Stop
            }
        }
    }

    /// Poll tick. Transport failures and job-less responses are logged and
    /// dropped; the session keeps its current state.
    pub fn apply_tick(&mut self, outcome: Result<Value, ApiError>) -> Directive {
        if self.is_terminal() {
            return Directive::Stop;
        }
        match outcome {
            Ok(raw) => self.apply_response(&raw).unwrap_or_else(|| {
                warn!(job_id = %self.job_id, "poll response without job record; ignoring");
                Directive::Continue
            }),
            Err(err) => {
                warn!(job_id = %self.job_id, "poll tick failed; keeping state: {err}");
                Directive::Continue
            }
        }
    }

    /// Result fetch that follows a `completed` status without a payload.
    /// Failures behave like a failed poll tick.
    pub fn apply_result(&mut self, outcome: Result<Value, ApiError>) -> Directive {
        if self.is_terminal() {
            return Directive::Stop;
        }
        match outcome {
            Ok(raw) => match self.apply_response(&raw) {
                Some(Directive::FetchResult) | None => {
                    let report = Report::from_response(&raw);
                    self.complete(report);
                    Directive::Stop
                }
                Some(directive) => directive,
            },
            Err(err) => {
                warn!(job_id = %self.job_id, "result fetch failed; will retry on next tick: {err}");
                Directive::Continue
            }
        }
    }

    /// Applies one response carrying a job record. `None` means no job record
    /// could be read.
    pub fn apply_response(&mut self, raw: &Value) -> Option<Directive> {
        if self.is_terminal() {
            return Some(Directive::Stop);
        }
        let normalized = normalize(raw);
        let job = normalized.job.as_ref().and_then(Job::from_value)?;
        debug!(job_id = %self.job_id, status = job.status.as_str(), progress = job.progress, "job update");

        let directive = match job.phase() {
            JobPhase::Completed if job.result.is_some() => {
                let report = Report::assemble(raw, &normalized, Some(&job));
                self.complete(report);
                Directive::Stop
            }
            JobPhase::Completed => {
                let snapshot = ProgressSnapshot::from_job(&self.job_id, &job, &normalized.sections);
                self.generating(job.status.clone(), snapshot);
                Directive::FetchResult
            }
            JobPhase::Failed => {
                let view = ErrorView::job_failed(job.error.as_deref()).with_detail(raw.clone());
                self.fail(view);
                Directive::Stop
            }
            JobPhase::NotStarted | JobPhase::InProgress => {
                let snapshot = ProgressSnapshot::from_job(&self.job_id, &job, &normalized.sections);
                self.generating(job.status.clone(), snapshot);
                Directive::Continue
            }
        };
        Some(directive)
    }

    /// Push `progress` event.
    pub fn apply_progress(&mut self, snapshot: ProgressSnapshot) -> Directive {
        if self.is_terminal() {
            return Directive::Stop;
        }
        let status = match &self.state {
            ViewState::Generating(view) => view.status.clone(),
            _ => JobStatus::Running,
        };
        self.generating(status, snapshot);
        Directive::Continue
    }

    pub fn mark_reconnecting(&mut self) {
        if let ViewState::Generating(view) = &mut self.state {
            view.connection = Connection::Reconnecting;
            return;
        }
        if matches!(self.state, ViewState::Loading) {
            self.state = ViewState::Generating(GeneratingView {
                job_id: self.job_id.clone(),
                status: JobStatus::Pending,
                percent: 0,
                snapshot: ProgressSnapshot {
                    job_id: self.job_id.clone(),
                    ..Default::default()
                },
                connection: Connection::Reconnecting,
            });
        }
    }

    pub fn fail(&mut self, view: ErrorView) {
        if self.is_terminal() {
            return;
        }
        warn!(job_id = %self.job_id, kind = ?view.kind, "session failed: {}", view.message);
        self.state = ViewState::Error(view);
    }

    fn complete(&mut self, report: Report) {
        info!(job_id = %self.job_id, sections = report.sections.len(), shape = ?report.shape, "report completed");
        self.state = ViewState::Completed(Box::new(report));
    }

    /// Replaces the in-progress view. A snapshot without per-section entries
    /// keeps the section list from the previous view.
    fn generating(&mut self, status: JobStatus, mut snapshot: ProgressSnapshot) {
        if let ViewState::Generating(prev) = &self.state {
            if snapshot.per_section.is_empty() {
                snapshot.per_section = prev.snapshot.per_section.clone();
                snapshot.total_count = snapshot.total_count.max(prev.snapshot.total_count);
                if snapshot.done_count == 0 {
                    snapshot.done_count = prev.snapshot.done_count;
                }
            }
        }
        self.state = ViewState::Generating(GeneratingView {
            job_id: self.job_id.clone(),
            status,
            percent: snapshot.overall_percent,
            snapshot,
            connection: Connection::Live,
        });
    }
}
