//! Report payload shapes.
//!
//! A finished job's result arrives in one of three historical layouts. The
//! layout is detected once, with a fixed precedence (array > map > legacy),
//! and only that layout is read.

use crate::normalize::{coerce_records, sections_candidate};
use crate::util::{first_present, get_present};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const PREMIUM_MODE: &str = "premium_business_30p";
pub const LEGACY_SECTION_ID: &str = "summary";

const LEGACY_FIELDS: &[&str] = &[
    "summary",
    "answer",
    "strengths",
    "risks",
    "action_plan",
    "lucky_periods",
    "caution_periods",
    "blessing",
    "disclaimer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    Legacy,
    MapSections,
    ArraySections,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportPayload {
    Legacy(LegacyPayload),
    MapSections { sections: Vec<Value>, meta: Option<Value> },
    ArraySections { sections: Vec<Value>, meta: Option<Value> },
    Empty,
}

/// Flat single-call report fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyPayload {
    pub fields: Map<String, Value>,
}

impl ReportPayload {
    pub fn detect(raw: &Value) -> Self {
        let meta = first_present(raw, &["meta", "data.meta"]).cloned();

        match sections_candidate(raw) {
            Some(list @ Value::Array(_)) => {
                let mode = meta
                    .as_ref()
                    .and_then(|m| m.get("mode"))
                    .and_then(Value::as_str);
                if mode != Some(PREMIUM_MODE) {
                    debug!(?mode, "array-shaped sections without premium mode marker");
                }
                return ReportPayload::ArraySections {
                    sections: coerce_records(list),
                    meta,
                };
            }
            Some(map @ Value::Object(_)) => {
                return ReportPayload::MapSections {
                    sections: coerce_records(map),
                    meta,
                };
            }
            _ => {}
        }

        let legacy_root = match get_present(raw, "legacy") {
            Some(inner @ Value::Object(_)) => inner,
            _ => raw,
        };
        if let Value::Object(map) = legacy_root {
            let fields: Map<String, Value> = LEGACY_FIELDS
                .iter()
                .filter_map(|k| {
                    map.get(*k)
                        .filter(|v| !v.is_null())
                        .map(|v| (k.to_string(), v.clone()))
                })
                .collect();
            if !fields.is_empty() {
                return ReportPayload::Legacy(LegacyPayload { fields });
            }
        }

        ReportPayload::Empty
    }

    pub fn shape(&self) -> PayloadShape {
        match self {
            ReportPayload::Legacy(_) => PayloadShape::Legacy,
            ReportPayload::MapSections { .. } => PayloadShape::MapSections,
            ReportPayload::ArraySections { .. } => PayloadShape::ArraySections,
            ReportPayload::Empty => PayloadShape::Empty,
        }
    }

    pub fn meta(&self) -> Option<&Value> {
        match self {
            ReportPayload::MapSections { meta, .. } | ReportPayload::ArraySections { meta, .. } => {
                meta.as_ref()
            }
            _ => None,
        }
    }

    /// Section records in payload order.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            ReportPayload::MapSections { sections, .. }
            | ReportPayload::ArraySections { sections, .. } => sections,
            ReportPayload::Legacy(legacy) => vec![legacy.into_record()],
            ReportPayload::Empty => Vec::new(),
        }
    }
}

impl LegacyPayload {
    /// Folds the flat fields into one section record. The narrative fields
    /// become the body; the rest keep their names and are picked up by the
    /// section field table.
    pub fn into_record(self) -> Value {
        let mut fields = self.fields;
        let body = ["summary", "answer"]
            .iter()
            .filter_map(|k| fields.remove(*k))
            .filter_map(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        fields.insert("id".into(), Value::String(LEGACY_SECTION_ID.into()));
        if !body.is_empty() {
            fields.insert("markdown".into(), Value::String(body));
        }
        Value::Object(fields)
    }
}
