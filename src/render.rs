//! Terminal rendering of report sessions.
//!
//! Layout only. Which sections and fields exist is decided upstream; a field
//! that is absent is simply not printed.

use crate::{
    config::Config,
    markdown::{blocks_to_text, strip_inline, to_blocks},
    report::Report,
    section::{DisplaySection, FieldKey, SectionKind},
    state::{Connection, ErrorView, EscapeAction, GeneratingView, ViewState},
    util::scalar_text,
};
use serde_json::Value;

const NARRATIVE_FIELDS: &[FieldKey] = &[
    FieldKey::Diagnosis,
    FieldKey::Highlights,
    FieldKey::Strengths,
    FieldKey::Hypotheses,
    FieldKey::StrategyOptions,
    FieldKey::Kpis,
    FieldKey::Risks,
    FieldKey::ActionItems,
];
const CALENDAR_FIELDS: &[FieldKey] = &[
    FieldKey::PeakMonths,
    FieldKey::RiskMonths,
    FieldKey::MonthlyPlans,
    FieldKey::QuarterlyMilestones,
];
const SPRINT_FIELDS: &[FieldKey] = &[
    FieldKey::MissionStatement,
    FieldKey::WeeklyPlans,
    FieldKey::Milestones,
    FieldKey::RiskScenarios,
];
const TRAILING_FIELDS: &[FieldKey] = &[
    FieldKey::Blessing,
    FieldKey::Disclaimer,
    FieldKey::EvidenceRefs,
];

/// Keys that name an entry inside a structured list, most specific first.
const LEAD_KEYS: &[&str] = &["month", "week", "quarter", "day"];
const HEADLINE_KEYS: &[&str] = &[
    "title",
    "theme",
    "milestone",
    "goal",
    "metric",
    "name",
    "category",
    "option",
    "hypothesis",
    "ifScenario",
    "scenario",
    "item",
    "action",
    "content",
];

pub fn field_label(key: FieldKey) -> &'static str {
    match key {
        FieldKey::Diagnosis => "Diagnosis",
        FieldKey::Hypotheses => "Hypotheses",
        FieldKey::StrategyOptions => "Strategy options",
        FieldKey::Kpis => "KPIs",
        FieldKey::Risks => "Risks",
        FieldKey::Highlights => "Highlights",
        FieldKey::Strengths => "Strengths",
        FieldKey::ActionItems => "Action items",
        FieldKey::MonthlyPlans => "Monthly plan",
        FieldKey::QuarterlyMilestones => "Quarterly milestones",
        FieldKey::PeakMonths => "Peak months",
        FieldKey::RiskMonths => "Risk months",
        FieldKey::MissionStatement => "Mission",
        FieldKey::WeeklyPlans => "Weekly sprint plan",
        FieldKey::Milestones => "Milestones",
        FieldKey::RiskScenarios => "Risk scenarios",
        FieldKey::EvidenceRefs => "Evidence",
        FieldKey::Blessing => "Blessing",
        FieldKey::Disclaimer => "Disclaimer",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub active: bool,
    pub failed: bool,
}

/// Tabbed view over a completed report. Switching tabs is local state only.
#[derive(Debug, Clone)]
pub struct ReportView {
    report: Report,
    active: String,
    product_name: String,
    show_raw_on_empty: bool,
}

impl ReportView {
    pub fn new(report: Report, cfg: &Config) -> Self {
        let active = if report.section(&cfg.render.default_tab).is_some() {
            cfg.render.default_tab.clone()
        } else {
            report
                .sections
                .first()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| cfg.render.default_tab.clone())
        };
        Self {
            report,
            active,
            product_name: cfg.branding.product_name.clone(),
            show_raw_on_empty: cfg.render.show_raw_on_empty,
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn active_tab(&self) -> &str {
        &self.active
    }

    /// Returns `false` and leaves the selection alone for unknown ids.
    pub fn select_tab(&mut self, id: &str) -> bool {
        if self.report.section(id).is_none() {
            return false;
        }
        self.active = id.to_string();
        true
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.report
            .sections
            .iter()
            .map(|s| Tab {
                id: s.id.clone(),
                title: s.title.clone(),
                active: s.id == self.active,
                failed: s.is_error(),
            })
            .collect()
    }

    pub fn render_header(&self) -> String {
        let mut out = vec![self.product_name.clone()];
        let accuracy = &self.report.accuracy;
        if accuracy.boundary_date {
            let note = accuracy
                .note
                .clone()
                .unwrap_or_else(|| "birth date falls near a calendar boundary".into());
            out.push(format!("Accuracy: LIMITED ({note})"));
        } else {
            out.push("Accuracy: STANDARD".into());
        }
        if let Some(confidence) = self.report.overall_confidence {
            out.push(format!("Overall confidence: {}", confidence.label()));
        }
        out.join("\n")
    }

    pub fn render_tabs(&self) -> String {
        self.tabs()
            .iter()
            .map(|t| {
                let mark = if t.failed { " !" } else { "" };
                if t.active {
                    format!("[{}{}]", t.title, mark)
                } else {
                    format!(" {}{} ", t.title, mark)
                }
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn render_active(&self) -> String {
        match self.report.section(&self.active) {
            Some(section) => render_section(section),
            None => self.render_diagnostic(false),
        }
    }

    pub fn render_all(&self) -> String {
        self.report
            .sections
            .iter()
            .map(render_section)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Shown when a completed job yields no readable sections.
    pub fn render_diagnostic(&self, debug_raw: bool) -> String {
        let mut out = vec![
            "No report sections could be read from this response.".to_string(),
            format!("Detected layout: {:?}", self.report.shape),
        ];
        if let Some(mode) = self.report.meta().and_then(|m| m.get("mode")).and_then(Value::as_str) {
            out.push(format!("Report mode: {mode}"));
        }
        out.push(raw_panel(&self.report.raw, debug_raw || self.show_raw_on_empty));
        out.push(actions_line(&[EscapeAction::Retry, EscapeAction::GoHome]));
        out.join("\n")
    }

    pub fn render(&self, all: bool, debug_raw: bool) -> String {
        let mut out = vec![self.render_header()];
        if self.report.is_empty() {
            out.push(self.render_diagnostic(debug_raw));
            return out.join("\n\n");
        }
        out.push(self.render_tabs());
        if all {
            out.push(self.render_all());
        } else {
            out.push(self.render_active());
        }
        if debug_raw {
            out.push(raw_panel(&self.report.raw, true));
        }
        out.join("\n\n")
    }
}

pub fn render_section(section: &DisplaySection) -> String {
    let mut out = vec![format!(
        "## {}  (confidence: {})",
        section.title,
        section.confidence.label()
    )];

    if let Some(err) = &section.error {
        out.push("! This section could not be generated.".into());
        if let Some(message) = &err.message {
            out.push(format!("  {message}"));
        }
        out.push("  The rest of the report is unaffected.".into());
        return out.join("\n");
    }

    if let Some(body) = &section.body {
        out.push(blocks_to_text(&to_blocks(body)));
    }

    let kind_fields = match section.kind() {
        SectionKind::Calendar => CALENDAR_FIELDS,
        SectionKind::Sprint => SPRINT_FIELDS,
        SectionKind::Narrative => NARRATIVE_FIELDS,
    };
    let ordered = kind_fields
        .iter()
        .chain(
            section
                .fields
                .keys()
                .filter(|k| !kind_fields.contains(*k) && !TRAILING_FIELDS.contains(*k)),
        )
        .chain(TRAILING_FIELDS.iter());

    for key in ordered {
        if let Some(value) = section.field(*key) {
            let lines = render_field(*key, value);
            if !lines.is_empty() {
                out.push(String::new());
                out.push(format!("### {}", field_label(*key)));
                out.extend(lines);
            }
        }
    }
    out.join("\n")
}

fn render_field(key: FieldKey, value: &Value) -> Vec<String> {
    match (key, value) {
        (FieldKey::EvidenceRefs, Value::Array(ids)) => {
            let shown: Vec<String> = ids.iter().take(5).filter_map(scalar_text).collect();
            let more = if ids.len() > shown.len() { ", …" } else { "" };
            vec![format!("  {} rule cards ({}{})", ids.len(), shown.join(", "), more)]
        }
        _ => render_value(value, 1),
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn render_value(value: &Value, depth: usize) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().flat_map(|item| render_item(item, depth)).collect(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| match scalar_text(v) {
                Some(text) => vec![format!("{}{}: {}", indent(depth), k, strip_inline(&text))],
                None => {
                    let mut lines = vec![format!("{}{}:", indent(depth), k)];
                    lines.extend(render_value(v, depth + 1));
                    lines
                }
            })
            .collect(),
        scalar => scalar_text(scalar)
            .map(|text| vec![format!("{}{}", indent(depth), strip_inline(&text))])
            .unwrap_or_default(),
    }
}

fn render_item(item: &Value, depth: usize) -> Vec<String> {
    let Value::Object(map) = item else {
        return scalar_text(item)
            .map(|text| vec![format!("{}• {}", indent(depth), strip_inline(&text))])
            .unwrap_or_else(|| render_value(item, depth));
    };

    let lead = LEAD_KEYS.iter().find(|k| map.contains_key(**k)).copied();
    let headline = HEADLINE_KEYS
        .iter()
        .find(|k| map.get(**k).and_then(scalar_text).is_some())
        .copied();

    let mut title_parts = Vec::new();
    for key in [lead, headline].into_iter().flatten() {
        if let Some(text) = map.get(key).and_then(scalar_text) {
            title_parts.push(match key {
                "week" => format!("Week {text}"),
                "day" => format!("Day {text}"),
                _ => strip_inline(&text),
            });
        }
    }

    let mut lines = Vec::new();
    if !title_parts.is_empty() {
        lines.push(format!("{}• {}", indent(depth), title_parts.join(" - ")));
    }
    for (k, v) in map {
        if Some(k.as_str()) == lead || Some(k.as_str()) == headline {
            continue;
        }
        match scalar_text(v) {
            Some(text) => lines.push(format!("{}{}: {}", indent(depth + 1), k, strip_inline(&text))),
            None => {
                let nested = render_value(v, depth + 2);
                if !nested.is_empty() {
                    lines.push(format!("{}{}:", indent(depth + 1), k));
                    lines.extend(nested);
                }
            }
        }
    }
    lines
}

pub fn render_progress(view: &GeneratingView) -> String {
    const WIDTH: usize = 20;
    let filled = (view.percent as usize * WIDTH) / 100;
    let mut line = format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        ".".repeat(WIDTH - filled),
        view.percent,
        view.status.as_str()
    );
    let snap = &view.snapshot;
    if snap.total_count > 0 {
        line.push_str(&format!(" ({}/{} sections)", snap.done_count, snap.total_count));
    }
    if let Some(stage) = &snap.current_stage {
        line.push_str(&format!(" · {stage}"));
    } else if let Some(section) = &snap.current_section_id {
        line.push_str(&format!(" · {section}"));
    }
    if let Some(eta) = snap.eta_seconds {
        line.push_str(&format!(" · eta {eta}s"));
    }
    if view.connection == Connection::Reconnecting {
        line.push_str(" · reconnecting");
    }
    line
}

pub fn render_error(view: &ErrorView, debug_raw: bool) -> String {
    let mut out = vec![format!("Error: {}", view.message)];
    if let Some(detail) = &view.detail {
        out.push(raw_panel(detail, debug_raw));
    }
    out.push(actions_line(&view.actions));
    out.join("\n")
}

/// One-shot rendering of whatever state a session ended in.
pub fn render_state(state: &ViewState, cfg: &Config, tab: Option<&str>, all: bool, debug_raw: bool) -> String {
    match state {
        ViewState::Loading => "Loading…".into(),
        ViewState::Generating(view) => render_progress(view),
        ViewState::Completed(report) => {
            let mut view = ReportView::new((**report).clone(), cfg);
            if let Some(tab) = tab {
                view.select_tab(tab);
            }
            view.render(all, debug_raw)
        }
        ViewState::Error(err) => render_error(err, debug_raw),
    }
}

fn raw_panel(raw: &Value, expanded: bool) -> String {
    if expanded {
        let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
        format!("▼ Raw response\n{pretty}")
    } else {
        "▶ Raw response (collapsed; pass --debug-raw to expand)".into()
    }
}

fn actions_line(actions: &[EscapeAction]) -> String {
    let labels: Vec<&str> = actions
        .iter()
        .map(|a| match a {
            EscapeAction::Retry => "retry",
            EscapeAction::GoHome => "go home",
        })
        .collect();
    format!("Actions: {}", labels.join(" · "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareStep {
    Ready,
    NeedsConfirmation,
    Cancelled,
}

/// Sharing waits for an explicit acknowledgement when the underlying
/// calculation sits on a boundary date.
#[derive(Debug, Clone)]
pub struct ShareFlow {
    needs_ack: bool,
    acknowledged: bool,
    cancelled: bool,
}

impl ShareFlow {
    pub fn for_report(report: &Report) -> Self {
        Self {
            needs_ack: report.accuracy.boundary_date,
            acknowledged: false,
            cancelled: false,
        }
    }

    pub fn request(&mut self) -> ShareStep {
        self.cancelled = false;
        if self.needs_ack && !self.acknowledged {
            ShareStep::NeedsConfirmation
        } else {
            ShareStep::Ready
        }
    }

    pub fn confirm(&mut self) -> ShareStep {
        self.acknowledged = true;
        ShareStep::Ready
    }

    pub fn cancel(&mut self) -> ShareStep {
        self.cancelled = true;
        ShareStep::Cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn confirmation_prompt(report: &Report) -> String {
        let note = report
            .accuracy
            .note
            .clone()
            .unwrap_or_else(|| "The birth date falls near a calendar boundary.".into());
        format!("{note} Results may be less accurate. Share anyway?")
    }
}

/// Plain-text share message: product, first readable section, link.
pub fn share_text(report: &Report, cfg: &Config) -> String {
    let mut out = vec![cfg.branding.product_name.clone()];
    if let Some(section) = report.sections.iter().find(|s| !s.is_error()) {
        out.push(section.title.clone());
        if let Some(first) = section.body.as_deref().map(to_blocks).and_then(|blocks| {
            blocks.into_iter().find_map(|b| match b {
                crate::markdown::Block::Paragraph(text) => Some(text),
                _ => None,
            })
        }) {
            out.push(first);
        }
    }
    if let Some(id) = &report.job_id {
        out.push(format!(
            "{}/report/{}",
            cfg.branding.share_base_url.trim_end_matches('/'),
            urlencoding::encode(id)
        ));
    }
    out.join("\n")
}
