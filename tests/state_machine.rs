use saju_report::api::ApiError;
use saju_report::job::JobStatus;
use saju_report::progress::ProgressSnapshot;
use saju_report::state::{
    Connection, Directive, ErrorKind, EscapeAction, GENERIC_JOB_FAILURE, ReportSession, ViewState,
};
use serde_json::json;

fn generating(session: &ReportSession) -> (JobStatus, u8) {
    match session.state() {
        ViewState::Generating(view) => (view.status.clone(), view.percent),
        other => panic!("expected generating, got {}", other.name()),
    }
}

#[test]
fn pending_running_completed() {
    let mut s = ReportSession::new("j1");
    assert_eq!(s.state(), &ViewState::Loading);

    let d = s.apply_initial(Ok(json!({"job": {"id": "j1", "status": "pending", "progress": 0}})));
    assert_eq!(d, Directive::Continue);
    assert_eq!(generating(&s), (JobStatus::Pending, 0));

    s.apply_tick(Ok(json!({"job": {"id": "j1", "status": "running", "progress": 30}})));
    assert_eq!(generating(&s), (JobStatus::Running, 30));

    s.apply_tick(Ok(json!({"job": {"id": "j1", "status": "generating", "progress": "60%"}})));
    assert_eq!(generating(&s), (JobStatus::Generating, 60));

    let d = s.apply_tick(Ok(json!({
        "job": {"id": "j1", "status": "completed", "result": {"sections": [{"id": "exec", "markdown": "hi"}]}}
    })));
    assert_eq!(d, Directive::Stop);
    match s.state() {
        ViewState::Completed(report) => {
            assert_eq!(report.sections.len(), 1);
            assert_eq!(report.sections[0].title, "Executive Summary");
        }
        other => panic!("expected completed, got {}", other.name()),
    }
}

#[test]
fn completed_absorbs_late_updates() {
    let mut s = ReportSession::new("j1");
    s.apply_initial(Ok(json!({"status": "completed", "result": {"sections": []}})));
    assert!(s.is_terminal());
    let before = s.state().clone();

    assert_eq!(
        s.apply_tick(Ok(json!({"status": "running", "progress": 10}))),
        Directive::Stop
    );
    s.apply_progress(ProgressSnapshot::default());
    s.mark_reconnecting();
    assert_eq!(s.state(), &before);
}

#[test]
fn failed_after_ticks_uses_backend_message_or_generic() {
    let mut s = ReportSession::new("j2");
    s.apply_initial(Ok(json!({"status": "running", "progress": 20})));
    s.apply_tick(Ok(json!({"status": "processing", "progress": 50})));
    let d = s.apply_tick(Ok(json!({"status": "failed", "error": "LLM quota"})));
    assert_eq!(d, Directive::Stop);
    match s.state() {
        ViewState::Error(view) => {
            assert_eq!(view.kind, ErrorKind::JobFailed);
            assert_eq!(view.message, "LLM quota");
            assert_eq!(view.actions, vec![EscapeAction::Retry, EscapeAction::GoHome]);
            assert!(view.detail.is_some());
        }
        other => panic!("expected error, got {}", other.name()),
    }

    let mut s = ReportSession::new("j3");
    s.apply_initial(Ok(json!({"status": "failed"})));
    match s.state() {
        ViewState::Error(view) => assert_eq!(view.message, GENERIC_JOB_FAILURE),
        other => panic!("expected error, got {}", other.name()),
    }
}

#[test]
fn tick_errors_are_swallowed() {
    let mut s = ReportSession::new("j4");
    s.apply_initial(Ok(json!({"status": "running", "progress": 45})));
    let d = s.apply_tick(Err(ApiError::Network("connection reset".into())));
    assert_eq!(d, Directive::Continue);
    assert_eq!(generating(&s), (JobStatus::Running, 45));

    let d = s.apply_tick(Ok(json!(null)));
    assert_eq!(d, Directive::Continue);
    assert_eq!(generating(&s), (JobStatus::Running, 45));
}

#[test]
fn initial_errors_are_fatal() {
    let mut s = ReportSession::new("j5");
    let d = s.apply_initial(Err(ApiError::Timeout { seconds: 20 }));
    assert_eq!(d, Directive::Stop);
    match s.state() {
        ViewState::Error(view) => assert_eq!(view.kind, ErrorKind::Timeout),
        other => panic!("expected error, got {}", other.name()),
    }

    let mut s = ReportSession::new("j6");
    s.apply_initial(Ok(json!({"message": "hello"})));
    match s.state() {
        ViewState::Error(view) => assert_eq!(view.kind, ErrorKind::MalformedResponse),
        other => panic!("expected error, got {}", other.name()),
    }
}

#[test]
fn completed_without_result_asks_for_result() {
    let mut s = ReportSession::new("j7");
    let d = s.apply_initial(Ok(json!({"completed": true})));
    assert_eq!(d, Directive::FetchResult);
    assert!(!s.is_terminal());

    assert_eq!(
        s.apply_result(Err(ApiError::Network("down".into()))),
        Directive::Continue
    );
    assert!(!s.is_terminal());

    let d = s.apply_result(Ok(json!({"sections": {"exec": "Body"}})));
    assert_eq!(d, Directive::Stop);
    assert!(matches!(s.state(), ViewState::Completed(_)));
}

#[test]
fn progress_is_replaced_not_merged() {
    let mut s = ReportSession::new("j8");
    s.apply_initial(Ok(json!({
        "status": "running",
        "progress": 70,
        "sections": [
            {"id": "exec", "status": "completed"},
            {"id": "money", "status": "running"}
        ]
    })));
    // a slower, older response resolving late still replaces the view
    s.apply_tick(Ok(json!({"status": "running", "progress": 40})));
    match s.state() {
        ViewState::Generating(view) => {
            assert_eq!(view.percent, 40);
            assert_eq!(view.snapshot.per_section.len(), 2);
            assert_eq!(view.connection, Connection::Live);
        }
        other => panic!("expected generating, got {}", other.name()),
    }
}

#[test]
fn reconnecting_is_cleared_by_next_update() {
    let mut s = ReportSession::new("j9");
    s.mark_reconnecting();
    match s.state() {
        ViewState::Generating(view) => assert_eq!(view.connection, Connection::Reconnecting),
        other => panic!("expected generating, got {}", other.name()),
    }
    s.apply_tick(Ok(json!({"status": "running", "progress": 5})));
    match s.state() {
        ViewState::Generating(view) => assert_eq!(view.connection, Connection::Live),
        other => panic!("expected generating, got {}", other.name()),
    }
}
