use crate::{
    job::Job,
    normalize::{Normalized, normalize},
    payload::{PayloadShape, ReportPayload},
    section::{Confidence, DisplaySection, adapt},
    util::{first_present, first_str},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BOUNDARY_FLAGS: &[&str] = &[
    "boundary_date",
    "is_boundary_date",
    "isBoundaryDate",
    "quality.boundary_date",
    "quality.is_boundary_date",
    "calculation_quality.boundary_date",
    "saju.quality.boundary_date",
    "boundary.is_boundary",
];

const BOUNDARY_NOTES: &[&str] = &[
    "boundary_note",
    "quality.boundary_note",
    "quality.message",
    "calculation_quality.message",
    "boundary.message",
];

/// Calculation-quality indicator shown above the tabs. Independent of the
/// per-section confidence labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Accuracy {
    pub boundary_date: bool,
    pub note: Option<String>,
}

impl Accuracy {
    pub fn from_input(input: &Map<String, Value>) -> Self {
        let input = Value::Object(input.clone());
        let boundary_date = BOUNDARY_FLAGS
            .iter()
            .filter_map(|p| crate::util::get_present(&input, p))
            .any(|v| v.as_bool().unwrap_or(false));
        Self {
            boundary_date,
            note: first_str(&input, BOUNDARY_NOTES).map(str::to_string),
        }
    }
}

/// A completed report in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub job_id: Option<String>,
    pub shape: PayloadShape,
    pub overall_confidence: Option<Confidence>,
    pub accuracy: Accuracy,
    pub sections: Vec<DisplaySection>,
    pub input: Map<String, Value>,
    /// The payload the sections were read from, kept for the debug panel.
    pub raw: Value,
}

impl Report {
    /// Builds the report for a completed job. The job's own result wins when
    /// present; otherwise the response itself is taken as the payload.
    pub fn assemble(raw: &Value, normalized: &Normalized, job: Option<&Job>) -> Report {
        match job.and_then(|j| j.result.as_ref()) {
            Some(result) => {
                let mut input = normalized.input.clone();
                if input.is_empty() {
                    input = normalize(result).input;
                }
                Self::from_payload(job.and_then(|j| j.id.clone()), result, input)
            }
            None => Self::from_payload(
                job.and_then(|j| j.id.clone()),
                raw,
                normalized.input.clone(),
            ),
        }
    }

    pub fn from_payload(job_id: Option<String>, payload: &Value, input: Map<String, Value>) -> Report {
        let detected = ReportPayload::detect(payload);
        let shape = detected.shape();
        let overall_confidence = detected
            .meta()
            .and_then(|m| first_str(m, &["confidence.overall", "confidence"]))
            .and_then(Confidence::parse);

        let mut sections: Vec<DisplaySection> = detected.into_records().iter().map(adapt).collect();
        if sections.iter().any(|s| s.order.is_some()) {
            sections.sort_by_key(|s| s.order.unwrap_or(i64::MAX));
        }

        Report {
            job_id,
            shape,
            overall_confidence,
            accuracy: Accuracy::from_input(&input),
            sections,
            input,
            raw: payload.clone(),
        }
    }

    /// Offline entry point for a saved response of any layout.
    pub fn from_response(raw: &Value) -> Report {
        let normalized = normalize(raw);
        let job = normalized.job.as_ref().and_then(Job::from_value);
        Self::assemble(raw, &normalized, job.as_ref())
    }

    pub fn section(&self, id: &str) -> Option<&DisplaySection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn meta(&self) -> Option<&Value> {
        first_present(&self.raw, &["meta", "data.meta"])
    }
}
