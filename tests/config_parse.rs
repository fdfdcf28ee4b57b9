use saju_report::config::{Config, TransportMode};

#[test]
fn parse_example_config() {
    let raw = include_str!("../saju-report.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.transport.mode, TransportMode::Pull);
    assert_eq!(cfg.transport.poll_interval_ms, 3000);
    assert_eq!(cfg.render.default_tab, "exec");
    assert!(cfg.api.routes.status.contains("{job_id}"));
    assert!(!cfg.branding.product_name.is_empty());
}

#[test]
fn partial_config_keeps_defaults() {
    let cfg: Config = toml::from_str(
        r#"
        [transport]
        mode = "push"

        [api]
        base_url = "https://api.example.test"
        "#,
    )
    .expect("parse TOML");
    assert_eq!(cfg.transport.mode, TransportMode::Push);
    assert_eq!(cfg.transport.poll_interval_ms, 3000);
    assert_eq!(cfg.api.base_url, "https://api.example.test");
    assert_eq!(cfg.api.routes.view, "/api/reports/view/{job_id}");
    assert_eq!(cfg.api.initial_fetch_timeout_seconds, 20);
}

#[test]
fn overrides_replace_base_url_and_brand() {
    let cfg = Config::default().with_overrides(
        Some(" https://prod.example.test ".into()),
        Some("Acme Fortune".into()),
    );
    assert_eq!(cfg.api.base_url, "https://prod.example.test");
    assert_eq!(cfg.branding.product_name, "Acme Fortune");

    let untouched = Config::default().with_overrides(Some("   ".into()), None);
    assert_eq!(untouched.api.base_url, "http://localhost:8000");
}
