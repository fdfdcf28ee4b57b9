use super::{
    EventReceiver, ReportApi,
    sse::SseParser,
    types::{ApiError, ViewLink},
};
use crate::config::{Config, Routes};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct HttpReportApi {
    client: reqwest::Client,
    base_url: String,
    routes: Routes,
    request_timeout: Duration,
    generate_timeout: Duration,
}

impl HttpReportApi {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.api.connect_timeout_seconds.max(1)))
            .user_agent(format!("saju-report/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.api.base_url.trim_end_matches('/').to_string(),
            routes: cfg.api.routes.clone(),
            request_timeout: Duration::from_secs(cfg.api.request_timeout_seconds.max(1)),
            generate_timeout: Duration::from_secs(cfg.api.generate_timeout_seconds.max(1)),
        })
    }

    fn url(&self, template: &str, job_id: Option<&str>) -> String {
        let path = match job_id {
            Some(id) => template.replace("{job_id}", &urlencoding::encode(id)),
            None => template.to_string(),
        };
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)], token_gated: bool) -> Result<Value, ApiError> {
        debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;
        read_json(resp, token_gated).await
    }

    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value, ApiError> {
        debug!("POST {url}");
        let resp = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| send_error(e, timeout))?;
        read_json(resp, false).await
    }
}

fn send_error(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

async fn read_json(resp: reqwest::Response, token_gated: bool) -> Result<Value, ApiError> {
    let status = resp.status();
    if token_gated && matches!(status.as_u16(), 403 | 404) {
        return Err(ApiError::InvalidToken);
    }
    let body = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// FastAPI-style `detail` (string or `{message}`), else the raw body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| v.get("detail"));
    let message = detail
        .and_then(|d| d.as_str().or_else(|| d.get("message").and_then(Value::as_str)))
        .map(str::to_string);
    message.unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl ReportApi for HttpReportApi {
    async fn health(&self) -> Result<String, ApiError> {
        let v = self.get_json(&self.url(&self.routes.health, None), &[], false).await?;
        Ok(v.get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()))
    }

    async fn calculate(&self, birth: &Value) -> Result<Value, ApiError> {
        self.post_json(&self.url(&self.routes.calculate, None), birth, self.request_timeout)
            .await
    }

    async fn generate_report(&self, request: &Value) -> Result<Value, ApiError> {
        self.post_json(
            &self.url(&self.routes.generate_report, None),
            request,
            self.generate_timeout,
        )
        .await
    }

    async fn start_report(&self, request: &Value) -> Result<Value, ApiError> {
        self.post_json(&self.url(&self.routes.start_report, None), request, self.request_timeout)
            .await
    }

    async fn fetch_status(&self, job_id: &str) -> Result<Value, ApiError> {
        self.get_json(&self.url(&self.routes.status, Some(job_id)), &[], false)
            .await
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Value, ApiError> {
        self.get_json(&self.url(&self.routes.result, Some(job_id)), &[], false)
            .await
    }

    async fn view_report(&self, link: &ViewLink) -> Result<Value, ApiError> {
        let url = self.url(&self.routes.view, Some(&link.job_id));
        self.get_json(&url, &[("token", link.token.as_str())], true).await
    }

    async fn retry_report(&self, job_id: &str) -> Result<Value, ApiError> {
        self.post_json(
            &self.url(&self.routes.retry, Some(job_id)),
            &Value::Null,
            self.request_timeout,
        )
        .await
    }

    async fn open_progress_stream(
        &self,
        job_id: &str,
        cancel: CancellationToken,
    ) -> Result<EventReceiver, ApiError> {
        let url = self.url(&self.routes.stream, Some(job_id));
        debug!("GET {url} (event stream)");
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut parser = SseParser::new();
            let mut bytes = Box::pin(resp.bytes_stream());
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = bytes.next() => match chunk {
                        Some(Ok(chunk)) => {
                            for event in parser.push(&chunk) {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!("progress stream read failed: {err}");
                            let _ = tx.send(Err(ApiError::Stream(err.to_string()))).await;
                            return;
                        }
                        None => {
                            if let Some(event) = parser.finish() {
                                let _ = tx.send(Ok(event)).await;
                            }
                            break;
                        }
                    }
                }
            }
            debug!("progress stream closed");
        });
        Ok(rx)
    }
}
