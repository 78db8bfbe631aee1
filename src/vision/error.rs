//! Vision error types

use thiserror::Error;

/// Vision error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct VisionError {
    pub kind: VisionErrorKind,
    pub message: String,
}

impl VisionError {
    pub fn new(kind: VisionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::InvalidRequest, message)
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Fetch, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Cancelled, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Unavailable, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Unknown, message)
    }

    /// Map a non-success prediction response
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => Self::auth(format!("Authentication failed: {body}")),
            429 => Self::rate_limit(format!("Rate limited: {body}")),
            408 => Self::timeout(format!("Request timeout: {body}")),
            400 | 404 => Self::invalid_request(format!("Invalid request: {body}")),
            500..=599 => Self::server_error(format!("Server error: {body}")),
            _ => Self::unknown(format!("HTTP {status}: {body}")),
        }
    }

    /// Map a transport failure
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionErrorKind {
    /// Connection failures
    Network,
    /// The request or the turn's deadline elapsed
    Timeout,
    /// Prediction key rejected (401, 403)
    Auth,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Bad request, unknown project or iteration (400, 404)
    InvalidRequest,
    /// The attachment could not be downloaded
    Fetch,
    /// The inbound request went away
    Cancelled,
    /// No classifier configured
    Unavailable,
    /// Unknown error
    Unknown,
}

impl VisionErrorKind {
    /// Worth retrying the same image later
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }
}
