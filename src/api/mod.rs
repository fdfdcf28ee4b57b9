pub mod http;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use types::{ApiError, StreamEvent, ViewLink};

pub type EventReceiver = mpsc::Receiver<Result<StreamEvent, ApiError>>;

/// Backend surface the client consumes. Every method converts its failures
/// into [`ApiError`] before returning.
#[async_trait]
pub trait ReportApi: Send + Sync {
    async fn health(&self) -> Result<String, ApiError>;
    async fn calculate(&self, birth: &Value) -> Result<Value, ApiError>;
    /// Synchronous generation; blocks for the whole generation run.
    async fn generate_report(&self, request: &Value) -> Result<Value, ApiError>;
    /// Asynchronous generation; answers with a job reference right away.
    async fn start_report(&self, request: &Value) -> Result<Value, ApiError>;
    async fn fetch_status(&self, job_id: &str) -> Result<Value, ApiError>;
    async fn fetch_result(&self, job_id: &str) -> Result<Value, ApiError>;
    async fn view_report(&self, link: &ViewLink) -> Result<Value, ApiError>;
    async fn retry_report(&self, job_id: &str) -> Result<Value, ApiError>;
    /// Opens the server-push progress channel. Events stop when `cancel`
    /// fires or the receiver is dropped.
    async fn open_progress_stream(
        &self,
        job_id: &str,
        cancel: CancellationToken,
    ) -> Result<EventReceiver, ApiError>;
}
