use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("request rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TrackerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::Transient(_))
    }

    /// Classify a non-success HTTP response. `what` names the resource for 404s.
    pub fn from_status(status: StatusCode, body: String, what: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => TrackerError::NotFound(what.to_string()),
            StatusCode::TOO_MANY_REQUESTS => TrackerError::Transient(format!("{status}: {body}")),
            // GitHub reports secondary rate limits as 403
            StatusCode::FORBIDDEN if body.to_lowercase().contains("rate limit") => {
                TrackerError::Transient(format!("{status}: {body}"))
            }
            s if s.is_server_error() => TrackerError::Transient(format!("{status}: {body}")),
            s => TrackerError::Rejected {
                status: s.as_u16(),
                body,
            },
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TrackerError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TrackerError::from_status(status, err.to_string(), "resource")
        } else {
            // connect, timeout, body and redirect failures
            TrackerError::Transient(err.to_string())
        }
    }
}

/// Turn a response into `Ok(resp)` for 2xx, or the classified error otherwise.
pub async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, TrackerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TrackerError::from_status(status, body, what))
}
