//! Section adaptation: any section record, whatever layout produced it, is
//! mapped onto [`DisplaySection`].

use crate::util::{first_str, get_path, get_present};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Known report sections, in presentation order.
pub const SECTION_TABLE: &[(&str, &str)] = &[
    ("exec", "Executive Summary"),
    ("money", "Money & Cashflow"),
    ("business", "Business Strategy"),
    ("team", "Team & Partner"),
    ("health", "Health & Performance"),
    ("calendar", "12-Month Calendar"),
    ("sprint", "90-Day Sprint"),
    ("summary", "Report Summary"),
];

pub const UNKNOWN_SECTION_ID: &str = "unknown";

pub fn static_title(id: &str) -> Option<&'static str> {
    SECTION_TABLE
        .iter()
        .find(|(sid, _)| *sid == id)
        .map(|(_, title)| *title)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Diagnosis,
    Hypotheses,
    StrategyOptions,
    Kpis,
    Risks,
    Highlights,
    Strengths,
    ActionItems,
    MonthlyPlans,
    QuarterlyMilestones,
    PeakMonths,
    RiskMonths,
    MissionStatement,
    WeeklyPlans,
    Milestones,
    RiskScenarios,
    EvidenceRefs,
    Blessing,
    Disclaimer,
}

/// Canonical field name -> every name the backend has used for it. Aliases
/// are dotted paths relative to the record (or to its `raw_json`).
pub const FIELD_TABLE: &[(FieldKey, &[&str])] = &[
    (FieldKey::Diagnosis, &["diagnosis", "keyMetrics", "key_metrics"]),
    (FieldKey::Hypotheses, &["hypotheses"]),
    (FieldKey::StrategyOptions, &["strategy_options", "strategyOptions"]),
    (FieldKey::Kpis, &["kpis", "KPIs"]),
    (FieldKey::Risks, &["risks"]),
    (FieldKey::Highlights, &["highlights"]),
    (FieldKey::Strengths, &["strengths"]),
    (FieldKey::ActionItems, &["action_items", "actionItems", "action_plan"]),
    (FieldKey::MonthlyPlans, &["monthly_plans", "monthlyPlans", "monthlyCalendar"]),
    (
        FieldKey::QuarterlyMilestones,
        &["quarterly_milestones", "quarterlyMilestones", "quarterSummary"],
    ),
    (
        FieldKey::PeakMonths,
        &["peak_months", "peakMonths", "yearOverview.bestMonths", "lucky_periods"],
    ),
    (
        FieldKey::RiskMonths,
        &["risk_months", "riskMonths", "yearOverview.cautionMonths", "caution_periods"],
    ),
    (
        FieldKey::MissionStatement,
        &["mission_statement", "missionStatement", "sprintOverview.mission"],
    ),
    (FieldKey::WeeklyPlans, &["weekly_plans", "weeklyPlans", "weeklyPlan"]),
    (FieldKey::Milestones, &["milestones"]),
    (
        FieldKey::RiskScenarios,
        &["risk_scenarios", "riskScenarios", "contingencyPlans"],
    ),
    (
        FieldKey::EvidenceRefs,
        &[
            "evidence_refs",
            "evidenceRefs",
            "rulecard_ids",
            "ruleCardIds",
            "evidence.ruleCardIds",
            "evidence.rulecard_ids",
        ],
    ),
    (FieldKey::Blessing, &["blessing"]),
    (FieldKey::Disclaimer, &["disclaimer"]),
];

const ID_KEYS: &[&str] = &["id", "section_id", "sectionId"];
const TITLE_KEYS: &[&str] = &["title", "section_title", "sectionTitle"];
const BODY_KEYS: &[&str] = &["markdown", "body", "body_markdown", "content"];
const CONFIDENCE_KEYS: &[&str] = &["confidence"];
const ERROR_MESSAGE_KEYS: &[&str] = &["error_message", "errorMessage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(Confidence::High),
            "MEDIUM" | "MID" => Some(Confidence::Medium),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Narrative,
    Calendar,
    Sprint,
}

impl SectionKind {
    pub fn for_id(id: &str) -> Self {
        match id {
            "calendar" => SectionKind::Calendar,
            "sprint" => SectionKind::Sprint,
            _ => SectionKind::Narrative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionError {
    pub message: Option<String>,
}

/// A section ready for display. A failed section carries only identity and
/// the error; body and structured fields stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySection {
    pub id: String,
    pub title: String,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<FieldKey, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SectionError>,
    #[serde(skip)]
    pub order: Option<i64>,
}

impl DisplaySection {
    pub fn placeholder() -> Self {
        Self {
            id: UNKNOWN_SECTION_ID.into(),
            title: "Untitled section".into(),
            confidence: Confidence::default(),
            body: None,
            fields: BTreeMap::new(),
            error: None,
            order: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn kind(&self) -> SectionKind {
        SectionKind::for_id(&self.id)
    }

    pub fn field(&self, key: FieldKey) -> Option<&Value> {
        self.fields.get(&key)
    }
}

/// Record plus its decoded `raw_json` fallback layer.
struct Layers<'a> {
    top: &'a Value,
    raw: Option<Value>,
}

impl<'a> Layers<'a> {
    fn new(record: &'a Value) -> Self {
        let raw = match get_present(record, "raw_json") {
            Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded)
                .ok()
                .filter(Value::is_object),
            Some(obj @ Value::Object(_)) => Some(obj.clone()),
            _ => None,
        };
        Self { top: record, raw }
    }

    fn layers(&self) -> impl Iterator<Item = &Value> {
        std::iter::once(self.top).chain(self.raw.iter())
    }

    fn lookup(&self, aliases: &[&str]) -> Option<&Value> {
        self.layers().find_map(|layer| {
            aliases.iter().find_map(|alias| get_present(layer, alias))
        })
    }

    fn lookup_str(&self, aliases: &[&str]) -> Option<&str> {
        self.layers()
            .find_map(|layer| first_str(layer, aliases))
            .filter(|s| !s.trim().is_empty())
    }
}

/// Maps a section record onto a [`DisplaySection`]. Fields resolve top-level
/// first, then through `raw_json`; a field found in neither stays absent.
pub fn adapt(record: &Value) -> DisplaySection {
    if !record.is_object() {
        return DisplaySection::placeholder();
    }

    let layers = Layers::new(record);
    let id = layers
        .lookup(ID_KEYS)
        .and_then(crate::util::scalar_text)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SECTION_ID.to_string());
    let title = layers
        .lookup_str(TITLE_KEYS)
        .map(str::to_string)
        .or_else(|| static_title(&id).map(str::to_string))
        .unwrap_or_else(|| id.clone());
    let order = layers
        .lookup(&["order", "section_order"])
        .and_then(crate::util::as_loose_i64);

    if let Some(error) = section_error(&layers) {
        return DisplaySection {
            id,
            title,
            confidence: Confidence::default(),
            body: None,
            fields: BTreeMap::new(),
            error: Some(error),
            order,
        };
    }

    let confidence = layers
        .lookup_str(CONFIDENCE_KEYS)
        .and_then(Confidence::parse)
        .unwrap_or_default();
    let body = layers.lookup_str(BODY_KEYS).map(str::to_string);

    let fields = FIELD_TABLE
        .iter()
        .filter_map(|(key, aliases)| layers.lookup(aliases).map(|v| (*key, v.clone())))
        .collect();

    DisplaySection {
        id,
        title,
        confidence,
        body,
        fields,
        error: None,
        order,
    }
}

fn section_error(layers: &Layers<'_>) -> Option<SectionError> {
    let message = layers.lookup_str(ERROR_MESSAGE_KEYS).map(str::to_string);
    let flagged = match get_path(layers.top, "error") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(msg)) if !msg.trim().is_empty() => {
            return Some(SectionError {
                message: message.or_else(|| Some(msg.clone())),
            });
        }
        _ => false,
    };
    let failed_status = first_str(layers.top, &["status"])
        .map(|s| s.eq_ignore_ascii_case("failed"))
        .unwrap_or(false);

    (flagged || failed_status).then_some(SectionError { message })
}
