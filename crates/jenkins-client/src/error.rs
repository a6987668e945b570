//! Error types for the Jenkins client.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Jenkins API calls.
pub type JenkinsResult<T> = Result<T, JenkinsError>;

/// Errors that can occur while talking to Jenkins.
#[derive(Debug, Error)]
pub enum JenkinsError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to set up tls: {0}")]
    Tls(#[source] rustls::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: hyper::Error,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl JenkinsError {
    /// Whether the error came back as an HTTP status from Jenkins itself.
    pub fn status(&self) -> Option<u16> {
        match self {
            JenkinsError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
