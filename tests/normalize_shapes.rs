use saju_report::normalize::normalize;
use saju_report::payload::{PayloadShape, ReportPayload};
use saju_report::report::Report;
use serde_json::{Value, json};

fn premium_sections(n: usize) -> Value {
    let ids = ["exec", "money", "business", "team", "health", "calendar", "sprint"];
    Value::Array(
        ids.iter()
            .take(n)
            .map(|id| json!({"id": id, "markdown": format!("## {id}\nbody")}))
            .collect(),
    )
}

#[test]
fn empty_inputs_do_not_panic() {
    let n = normalize(&Value::Null);
    assert_eq!(n.job, None);
    assert!(n.sections.is_empty());
    assert!(n.input.is_empty());

    let n = normalize(&json!({}));
    assert_eq!(n.job, Some(json!({})));
    assert!(n.sections.is_empty());
    assert!(n.input.is_empty());
}

#[test]
fn wrapped_job_and_data_sections_are_found() {
    let raw = json!({
        "data": {
            "job": {"id": "j1", "status": "running", "progress": 40},
            "sections": [{"id": "exec"}],
            "input": {"name": "Kim"}
        }
    });
    let n = normalize(&raw);
    assert_eq!(n.job, Some(json!({"id": "j1", "status": "running", "progress": 40})));
    assert_eq!(n.sections, vec![json!({"id": "exec"})]);
    assert_eq!(n.input.get("name"), Some(&json!("Kim")));
}

#[test]
fn first_present_wrapper_wins() {
    let raw = json!({
        "job": {"id": "top", "status": "queued"},
        "job_data": {"id": "other", "status": "failed"},
        "sections": [],
        "report_sections": [{"id": "exec"}]
    });
    let n = normalize(&raw);
    assert_eq!(n.job.as_ref().and_then(|j| j.get("id")), Some(&json!("top")));
    assert!(n.sections.is_empty());
}

#[test]
fn top_level_array_job_is_read_positionally() {
    let raw = json!([{"job": {"id": "j9", "status": "completed"}}]);
    assert_eq!(
        normalize(&raw).job,
        Some(json!({"id": "j9", "status": "completed"}))
    );
}

#[test]
fn canonical_shape_is_a_fixed_point() {
    let samples = [
        Value::Null,
        json!({}),
        json!({"job": {"id": "a", "status": "running"}, "sections": {"exec": "text"}}),
        json!({"data": {"job": null, "sections": [{"id": "money"}], "input": {"x": 1}}}),
        json!({"status": "completed", "result": {"sections": []}}),
    ];
    for raw in samples {
        let once = normalize(&raw);
        let twice = normalize(&once.to_value());
        assert_eq!(once, twice, "not a fixed point for {raw}");
    }
}

#[test]
fn keyed_sections_get_ids_injected() {
    let raw = json!({"sections": {
        "exec": {"title": "Exec", "markdown": "x"},
        "money": "plain body",
        "skip": 3
    }});
    let n = normalize(&raw);
    assert_eq!(n.sections.len(), 2);
    assert_eq!(n.sections[0]["id"], json!("exec"));
    assert_eq!(n.sections[1], json!({"id": "money", "markdown": "plain body"}));
}

#[test]
fn array_shape_without_mode_marker_is_still_sections() {
    let raw = json!({"sections": premium_sections(7), "summary": "ignored"});
    let payload = ReportPayload::detect(&raw);
    assert_eq!(payload.shape(), PayloadShape::ArraySections);
    assert_eq!(payload.into_records().len(), 7);
}

#[test]
fn map_shape_keeps_backend_order_and_meta() {
    let raw = json!({
        "meta": {"confidence": {"overall": "high"}},
        "sections": {
            "sprint": {"markdown": "s"},
            "exec": {"markdown": "e"},
            "calendar": {"markdown": "c"}
        }
    });
    let report = Report::from_payload(None, &raw, Default::default());
    assert_eq!(report.shape, PayloadShape::MapSections);
    let ids: Vec<&str> = report.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["sprint", "exec", "calendar"]);
    assert_eq!(
        report.overall_confidence.map(|c| c.label()),
        Some("HIGH")
    );
}

#[test]
fn explicit_order_sorts_sections() {
    let raw = json!({"sections": [
        {"id": "money", "order": 2},
        {"id": "exec", "order": 1},
        {"id": "team", "section_order": 3}
    ]});
    let report = Report::from_payload(None, &raw, Default::default());
    let ids: Vec<&str> = report.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["exec", "money", "team"]);
}

#[test]
fn legacy_payload_becomes_summary_section() {
    let raw = json!({
        "summary": "Overall calm year.",
        "answer": "Focus on savings.",
        "strengths": ["patience"],
        "lucky_periods": ["March"],
        "blessing": "Good luck"
    });
    let report = Report::from_payload(None, &raw, Default::default());
    assert_eq!(report.shape, PayloadShape::Legacy);
    assert_eq!(report.sections.len(), 1);
    let summary = &report.sections[0];
    assert_eq!(summary.id, "summary");
    assert_eq!(summary.title, "Report Summary");
    assert_eq!(
        summary.body.as_deref(),
        Some("Overall calm year.\n\nFocus on savings.")
    );
    assert!(!summary.fields.is_empty());
}

#[test]
fn nothing_recognisable_is_empty() {
    let report = Report::from_response(&json!({"status": "completed", "result": {"foo": 1}}));
    assert_eq!(report.shape, PayloadShape::Empty);
    assert!(report.is_empty());
}

#[test]
fn completed_job_result_is_the_payload() {
    let raw = json!({
        "job": {
            "id": "j1",
            "status": "completed",
            "result_json": {"sections": premium_sections(2), "input": {"boundary_date": true}}
        }
    });
    let report = Report::from_response(&raw);
    assert_eq!(report.job_id.as_deref(), Some("j1"));
    assert_eq!(report.sections.len(), 2);
    assert!(report.accuracy.boundary_date);
}
