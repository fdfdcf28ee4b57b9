use saju_report::api::{ApiError, StreamEvent, ViewLink};
use serde_json::json;

#[test]
fn link_requires_id_and_token() {
    assert!(matches!(ViewLink::new(None, Some("t")), Err(ApiError::InvalidLink(_))));
    assert!(matches!(ViewLink::new(Some("abc"), None), Err(ApiError::InvalidLink(_))));
    assert!(matches!(ViewLink::new(Some("abc"), Some("  ")), Err(ApiError::InvalidLink(_))));
    let link = ViewLink::new(Some(" abc "), Some("tok")).unwrap();
    assert_eq!(link.job_id, "abc");
    assert_eq!(link.token, "tok");
}

#[test]
fn bookmarkable_url_is_parsed() {
    let link = ViewLink::parse_url("https://sajuos.com/reports/view/r-42?token=s3cr%2Bt").unwrap();
    assert_eq!(link.job_id, "r-42");
    assert_eq!(link.token, "s3cr+t");

    assert!(ViewLink::parse_url("https://sajuos.com/reports/view/r-42").is_err());
    assert!(ViewLink::parse_url("https://sajuos.com/reports/view/?token=abc").is_err());
    assert!(ViewLink::parse_url("https://sajuos.com/reports/view?token=abc").is_err());
    assert!(ViewLink::parse_url("https://sajuos.com/reports/r-42?token=abc").is_err());

    let nested = ViewLink::parse_url("https://sajuos.com/reports/view/r-42/print?token=abc").unwrap();
    assert_eq!(nested.job_id, "r-42");
    assert!(ViewLink::parse_url("not a url").is_err());
}

#[test]
fn stream_frames_map_to_events() {
    assert_eq!(
        StreamEvent::from_frame(Some("progress"), r#"{"overall_percent": 40}"#),
        StreamEvent::Progress(json!({"overall_percent": 40}))
    );
    assert_eq!(
        StreamEvent::from_frame(None, r#"{"type": "complete"}"#),
        StreamEvent::Complete(json!({"type": "complete"}))
    );
    assert_eq!(
        StreamEvent::from_frame(Some("error"), r#"{"message": "boom"}"#),
        StreamEvent::Error("boom".into())
    );
    assert!(matches!(
        StreamEvent::from_frame(Some("ping"), "keepalive"),
        StreamEvent::Other { .. }
    ));
}
