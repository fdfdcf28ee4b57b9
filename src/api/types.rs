use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("invalid report link: {0}")]
    InvalidLink(String),
    #[error("this report link is invalid or has expired")]
    InvalidToken,
    #[error("server error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("progress stream failed: {0}")]
    Stream(String),
}

/// Job id + access token pair of an emailed report link. Both are required;
/// construction fails before any request is made when either is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLink {
    pub job_id: String,
    pub token: String,
}

impl ViewLink {
    pub fn new(job_id: Option<&str>, token: Option<&str>) -> Result<Self, ApiError> {
        let job_id = job_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::InvalidLink("missing report id".into()))?;
        let token = token
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::InvalidLink("missing access token".into()))?;
        Ok(Self {
            job_id: job_id.to_string(),
            token: token.to_string(),
        })
    }

    /// Parses a bookmarkable `.../view/{job_id}?token=...` URL. The id is the
    /// segment right after `view`; nothing else in the path is taken as one.
    pub fn parse_url(link: &str) -> Result<Self, ApiError> {
        let url = Url::parse(link.trim()).map_err(|e| ApiError::InvalidLink(e.to_string()))?;
        let job_id = url.path_segments().and_then(|mut segs| {
            segs.by_ref().find(|s| *s == "view")?;
            segs.next().filter(|s| !s.is_empty()).map(str::to_string)
        });
        let token = url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned());
        Self::new(job_id.as_deref(), token.as_deref())
    }
}

/// Typed server-push event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(Value),
    Complete(Value),
    Error(String),
    Other { event: String, data: Value },
}

impl StreamEvent {
    /// Maps an event-stream frame. An unnamed frame may carry its type in a
    /// `type` field of the JSON data.
    pub fn from_frame(event: Option<&str>, data: &str) -> Self {
        let data: Value = serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()));
        let name = event
            .map(str::to_string)
            .or_else(|| data.get("type").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "message".to_string());

        match name.as_str() {
            "progress" => StreamEvent::Progress(data),
            "complete" | "completed" | "done" => StreamEvent::Complete(data),
            "error" => {
                let message = data
                    .get("message")
                    .or_else(|| data.get("error"))
                    .and_then(Value::as_str)
                    .or_else(|| data.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                StreamEvent::Error(message)
            }
            _ => StreamEvent::Other { event: name, data },
        }
    }
}
