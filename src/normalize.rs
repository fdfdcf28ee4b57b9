//! Response normalization.
//!
//! The backend has shipped several response layouts over time. Everything
//! downstream consumes the canonical `{ job, sections, input }` triple
//! produced here, so this is the only place that knows about wrapper keys.

use crate::util::get_path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const JOB_PATHS: &[&str] = &["job", "data.job", "0.job", "job_data", "jobData"];
pub(crate) const SECTION_PATHS: &[&str] =
    &["sections", "data.sections", "report_sections", "section_list"];
const INPUT_PATHS: &[&str] = &[
    "input",
    "data.input",
    "input_data",
    "inputData",
    "job.input_data",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Normalized {
    pub job: Option<Value>,
    pub sections: Vec<Value>,
    pub input: Map<String, Value>,
}

/// Canonicalizes an arbitrary backend payload. Never fails and never mutates
/// `raw`; probing stops at the first candidate key that is present, so fields
/// from two wrappers are never mixed.
pub fn normalize(raw: &Value) -> Normalized {
    Normalized {
        job: resolve_job(raw),
        sections: resolve_sections(raw),
        input: resolve_input(raw),
    }
}

fn probe<'a>(raw: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| {
        // positional probing only makes sense on a top-level array
        if p.starts_with("0.") && !raw.is_array() {
            return None;
        }
        get_path(raw, p)
    })
}

fn resolve_job(raw: &Value) -> Option<Value> {
    match probe(raw, JOB_PATHS) {
        Some(Value::Null) => None,
        Some(job) => Some(job.clone()),
        None if raw.is_null() => None,
        None => Some(raw.clone()),
    }
}

fn resolve_sections(raw: &Value) -> Vec<Value> {
    sections_candidate(raw).map(coerce_records).unwrap_or_default()
}

fn resolve_input(raw: &Value) -> Map<String, Value> {
    match probe(raw, INPUT_PATHS) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

pub(crate) fn sections_candidate(raw: &Value) -> Option<&Value> {
    probe(raw, SECTION_PATHS)
}

/// Turns a `sections` value into a list of section records. Arrays are taken
/// as-is; keyed maps become records with the key injected as `id` when the
/// record does not carry one. Anything else yields an empty list.
pub(crate) fn coerce_records(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, record)| keyed_record(key, record))
            .collect(),
        _ => Vec::new(),
    }
}

fn keyed_record(key: &str, record: &Value) -> Option<Value> {
    match record {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            if !fields.contains_key("id") && !fields.contains_key("section_id") {
                fields.insert("id".into(), Value::String(key.to_string()));
            }
            Some(Value::Object(fields))
        }
        Value::String(body) => {
            let mut fields = Map::new();
            fields.insert("id".into(), Value::String(key.to_string()));
            fields.insert("markdown".into(), Value::String(body.clone()));
            Some(Value::Object(fields))
        }
        _ => None,
    }
}

impl Normalized {
    /// The canonical triple as JSON, suitable for feeding back into
    /// [`normalize`].
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "job": self.job,
            "sections": self.sections,
            "input": self.input,
        })
    }
}
