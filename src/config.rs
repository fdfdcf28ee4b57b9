use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_API_BASE: &str = "SAJU_REPORT_API_BASE";
pub const ENV_BRAND: &str = "SAJU_REPORT_BRAND";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub branding: Branding,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Deploy-time overrides. Read once here; nothing downstream touches the
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_API_BASE).ok(),
            std::env::var(ENV_BRAND).ok(),
        )
    }

    pub fn with_overrides(mut self, api_base: Option<String>, brand: Option<String>) -> Self {
        if let Some(base) = api_base.filter(|s| !s.trim().is_empty()) {
            self.api.base_url = base.trim().to_string();
        }
        if let Some(brand) = brand.filter(|s| !s.trim().is_empty()) {
            self.branding.product_name = brand.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Api {
    pub base_url: String,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub initial_fetch_timeout_seconds: u64,
    pub generate_timeout_seconds: u64,
    #[serde(default)]
    pub routes: Routes,
}
impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
            initial_fetch_timeout_seconds: 20,
            generate_timeout_seconds: 600,
            routes: Default::default(),
        }
    }
}

/// Route templates; `{job_id}` is substituted (URL-encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub health: String,
    pub calculate: String,
    pub generate_report: String,
    pub start_report: String,
    pub status: String,
    pub result: String,
    pub stream: String,
    pub view: String,
    pub retry: String,
}
impl Default for Routes {
    fn default() -> Self {
        Self {
            health: "/health".into(),
            calculate: "/api/v1/calculate".into(),
            generate_report: "/api/v1/generate-report".into(),
            start_report: "/api/reports/start".into(),
            status: "/api/reports/{job_id}/status".into(),
            result: "/api/reports/{job_id}/result".into(),
            stream: "/api/reports/{job_id}/stream".into(),
            view: "/api/reports/view/{job_id}".into(),
            retry: "/api/reports/{job_id}/retry".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub product_name: String,
    pub share_base_url: String,
}
impl Default for Branding {
    fn default() -> Self {
        Self {
            product_name: "SajuOS Premium Report".into(),
            share_base_url: "https://sajuos.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Push,
    Pull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Transport {
    pub mode: TransportMode,
    pub poll_interval_ms: u64,
}
impl Default for Transport {
    fn default() -> Self {
        Self {
            mode: TransportMode::Pull,
            poll_interval_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Render {
    pub default_tab: String,
    pub show_raw_on_empty: bool,
}
impl Default for Render {
    fn default() -> Self {
        Self {
            default_tab: "exec".into(),
            show_raw_on_empty: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
