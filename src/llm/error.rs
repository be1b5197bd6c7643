//! Model caller error types.
//!
//! Step execution is fail-fast: a transport-level error aborts the whole run,
//! so classification here exists for diagnostics, not retry control.

use thiserror::Error;

/// Error from a model invocation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Rate limited by the upstream provider (429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream server error (5xx).
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Request rejected (auth, bad request, unknown model).
    #[error("Client error (HTTP {status}): {message}")]
    ClientError { status: u16, message: String },

    /// Connection failure or timeout before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider responded but the body was not the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Classify an HTTP error status into an [`LlmError`].
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            500..=599 => Self::ServerError {
                status,
                message: body,
            },
            _ => Self::ClientError {
                status,
                message: body,
            },
        }
    }
}
