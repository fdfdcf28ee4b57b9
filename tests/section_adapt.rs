use saju_report::section::{Confidence, FieldKey, SectionKind, adapt};
use serde_json::{Value, json};

#[test]
fn null_and_non_objects_yield_placeholder() {
    for raw in [Value::Null, json!("text"), json!(3), json!([])] {
        let section = adapt(&raw);
        assert_eq!(section.id, "unknown");
        assert!(section.body.is_none());
        assert!(section.fields.is_empty());
        assert!(!section.is_error());
    }
}

#[test]
fn error_flag_short_circuits_content() {
    let section = adapt(&json!({
        "id": "money",
        "error": true,
        "error_message": "LLM timeout",
        "markdown": "should not be shown",
        "kpis": ["x"]
    }));
    assert!(section.is_error());
    assert_eq!(section.title, "Money & Cashflow");
    assert_eq!(
        section.error.as_ref().and_then(|e| e.message.as_deref()),
        Some("LLM timeout")
    );
    assert!(section.body.is_none());
    assert!(section.fields.is_empty());
}

#[test]
fn failed_status_or_error_string_is_an_error() {
    let by_status = adapt(&json!({"id": "team", "status": "failed"}));
    assert!(by_status.is_error());
    assert_eq!(by_status.error.and_then(|e| e.message), None);

    let by_string = adapt(&json!({"id": "team", "error": "quota exceeded"}));
    assert_eq!(
        by_string.error.and_then(|e| e.message).as_deref(),
        Some("quota exceeded")
    );

    let healthy = adapt(&json!({"id": "team", "error": false, "status": "completed"}));
    assert!(!healthy.is_error());
}

#[test]
fn title_falls_back_to_table_then_raw_id() {
    assert_eq!(adapt(&json!({"id": "sprint"})).title, "90-Day Sprint");
    assert_eq!(adapt(&json!({"id": "astro_extra"})).title, "astro_extra");
    assert_eq!(
        adapt(&json!({"section_id": "exec", "title": "Custom"})).title,
        "Custom"
    );
}

#[test]
fn top_level_beats_raw_json() {
    let section = adapt(&json!({
        "id": "business",
        "kpis": ["top"],
        "raw_json": {"kpis": ["nested"], "risks": ["from raw"]}
    }));
    assert_eq!(section.field(FieldKey::Kpis), Some(&json!(["top"])));
    assert_eq!(section.field(FieldKey::Risks), Some(&json!(["from raw"])));
}

#[test]
fn raw_json_string_is_decoded() {
    let encoded = json!({"diagnosis": {"cash": "tight"}, "confidence": "low"}).to_string();
    let section = adapt(&json!({"id": "money", "raw_json": encoded}));
    assert_eq!(
        section.field(FieldKey::Diagnosis),
        Some(&json!({"cash": "tight"}))
    );
    assert_eq!(section.confidence, Confidence::Low);
}

#[test]
fn absent_fields_stay_absent() {
    let section = adapt(&json!({"id": "exec", "markdown": "hello"}));
    assert_eq!(section.body.as_deref(), Some("hello"));
    assert!(section.fields.is_empty());
    assert_eq!(section.confidence, Confidence::Medium);
}

#[test]
fn aliases_map_onto_canonical_fields() {
    let calendar = adapt(&json!({
        "id": "calendar",
        "monthlyCalendar": [{"month": "2026-01", "theme": "Plan"}],
        "yearOverview": {"bestMonths": ["May"], "cautionMonths": ["Aug"]}
    }));
    assert_eq!(calendar.kind(), SectionKind::Calendar);
    assert!(calendar.field(FieldKey::MonthlyPlans).is_some());
    assert_eq!(calendar.field(FieldKey::PeakMonths), Some(&json!(["May"])));
    assert_eq!(calendar.field(FieldKey::RiskMonths), Some(&json!(["Aug"])));

    let sprint = adapt(&json!({
        "id": "sprint",
        "sprintOverview": {"mission": "Ship v1"},
        "weeklyPlan": [{"week": 1, "theme": "Setup"}],
        "evidence": {"ruleCardIds": ["rc1", "rc2"]}
    }));
    assert_eq!(sprint.kind(), SectionKind::Sprint);
    assert_eq!(sprint.field(FieldKey::MissionStatement), Some(&json!("Ship v1")));
    assert_eq!(sprint.field(FieldKey::EvidenceRefs), Some(&json!(["rc1", "rc2"])));
}
