//! Failure modes of backend calls.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Not logged in: no credential available")]
    AuthMissing,
    #[error("Credential rejected by the backend")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Map a non-success HTTP status to the matching error kind
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => ClientError::Unauthorized,
            404 => ClientError::NotFound(detail_or(body)),
            409 => ClientError::Conflict(detail_or(body)),
            code => ClientError::Status {
                status: code,
                body: detail_or(body),
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

// FastAPI wraps error messages as {"detail": "..."}.
fn detail_or(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body)
}
