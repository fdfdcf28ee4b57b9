use crate::job::Job;
use crate::util::{first_i64, first_present, first_str, scalar_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub id: String,
    pub title: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

/// Point-in-time generation progress. Rebuilt from scratch on every push
/// event or poll tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub overall_percent: u8,
    pub done_count: u32,
    pub total_count: u32,
    pub current_section_id: Option<String>,
    pub current_stage: Option<String>,
    pub eta_seconds: Option<u64>,
    pub per_section: Vec<SectionProgress>,
}

impl ProgressSnapshot {
    /// Builds a snapshot from a `progress` stream event payload.
    pub fn from_value(job_id: &str, v: &Value) -> Self {
        let per_section = first_present(v, &["per_section_status", "perSectionStatus", "sections"])
            .map(section_list)
            .unwrap_or_default();

        let mut snap = ProgressSnapshot {
            job_id: first_present(v, &["job_id", "jobId", "report_id", "id"])
                .and_then(scalar_text)
                .unwrap_or_else(|| job_id.to_string()),
            overall_percent: percent(first_i64(v, &["overall_percent", "overallPercent", "progress", "percent"])),
            done_count: count(first_i64(v, &["done_count", "doneCount", "done", "completed_sections"])),
            total_count: count(first_i64(v, &["total_count", "totalCount", "total", "total_sections"])),
            current_section_id: first_str(v, &["current_section_id", "currentSectionId", "current_section"])
                .map(str::to_string),
            current_stage: first_str(v, &["current_stage", "currentStage", "current_step", "stage"])
                .map(str::to_string),
            eta_seconds: first_i64(v, &["eta_seconds", "etaSeconds", "eta"]).map(|s| s.max(0) as u64),
            per_section,
        };
        snap.fill_counts();
        snap
    }

    /// Builds a snapshot from a polled job record plus whatever section
    /// status list accompanied it.
    pub fn from_job(job_id: &str, job: &Job, sections: &[Value]) -> Self {
        let per_section = sections.iter().filter_map(section_entry).collect::<Vec<_>>();
        let current_section_id = per_section
            .iter()
            .find(|s| is_running(&s.status))
            .map(|s| s.id.clone());

        let mut snap = ProgressSnapshot {
            job_id: job.id.clone().unwrap_or_else(|| job_id.to_string()),
            overall_percent: job.progress,
            done_count: 0,
            total_count: 0,
            current_section_id,
            current_stage: job.current_stage.clone(),
            eta_seconds: job.eta_seconds,
            per_section,
        };
        snap.fill_counts();
        snap
    }

    fn fill_counts(&mut self) {
        if self.total_count == 0 {
            self.total_count = self.per_section.len() as u32;
        }
        if self.done_count == 0 {
            self.done_count = self
                .per_section
                .iter()
                .filter(|s| s.status.eq_ignore_ascii_case("completed"))
                .count() as u32;
        }
    }
}

fn percent(v: Option<i64>) -> u8 {
    v.unwrap_or(0).clamp(0, 100) as u8
}

fn count(v: Option<i64>) -> u32 {
    v.unwrap_or(0).max(0) as u32
}

fn is_running(status: &str) -> bool {
    matches!(
        status.to_ascii_lowercase().as_str(),
        "running" | "processing" | "generating"
    )
}

fn section_list(v: &Value) -> Vec<SectionProgress> {
    match v {
        Value::Array(items) => items.iter().filter_map(section_entry).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(id, entry)| match entry {
                Value::String(status) => SectionProgress {
                    id: id.clone(),
                    title: None,
                    status: status.clone(),
                    error: None,
                },
                other => {
                    let mut parsed = section_entry(other).unwrap_or(SectionProgress {
                        id: id.clone(),
                        title: None,
                        status: "pending".into(),
                        error: None,
                    });
                    parsed.id = id.clone();
                    parsed
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn section_entry(v: &Value) -> Option<SectionProgress> {
    let id = first_present(v, &["id", "section_id", "sectionId"]).and_then(scalar_text)?;
    Some(SectionProgress {
        id,
        title: first_str(v, &["title", "section_title"]).map(str::to_string),
        status: first_str(v, &["status"]).unwrap_or("pending").to_string(),
        error: first_str(v, &["error", "error_message"])
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
    })
}
