use thiserror::Error;

/// Failure to parse a quick or absolute time-range expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    #[error("invalid time unit '{0}' in quick range")]
    InvalidUnit(String),
    #[error("invalid amount in quick range '{0}'")]
    InvalidAmount(String),
    #[error("cannot parse '{input}' as a time ({expected})")]
    InvalidTimestamp { input: String, expected: &'static str },
}

/// Errors surfaced by the HTTP API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the session; callers should navigate to login.
    #[error("not authenticated")]
    Unauthenticated,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthenticated => Some(403),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
