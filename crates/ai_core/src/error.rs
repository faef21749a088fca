//! Inference errors

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the inference server
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Failed to connect to inference server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to inference server failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response parsing failed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout during request
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("Server returned {status}: {body}")]
    ServerError { status: u16, body: String },

    /// Error reported by the server inside a streamed body
    #[error("{0}")]
    Generation(String),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),
}

impl InferenceError {
    /// Classify a transport error, recording the timeout that applied
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout.as_millis() as u64)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }

    /// HTTP status, when the server answered with a failure status
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
