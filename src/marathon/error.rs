// ABOUTME: Error types for scheduler API calls and deployment waits.
// ABOUTME: Distinguishes not-found, conflicts and transport failures.

use crate::http::HttpError;
use http::StatusCode;
use std::time::Duration;

/// Errors returned by a `ClusterApi` implementation.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("application not found: {0}")]
    NotFound(String),

    #[error("application already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid application id: {0}")]
    InvalidId(String),

    #[error("unexpected response {status} from scheduler: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid scheduler url: {0}")]
    InvalidUrl(String),

    #[error("invalid scheduler credentials: {0}")]
    InvalidCredentials(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to decode scheduler response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Errors raised by the polling waits.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("the operation has timed out after {0:?}")]
    Timeout(Duration),

    #[error("wait cancelled")]
    Cancelled,

    #[error("failed to read application state: {0}")]
    Cluster(#[source] Box<ClusterError>),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout(_))
    }
}

impl From<ClusterError> for WaitError {
    fn from(err: ClusterError) -> Self {
        WaitError::Cluster(Box::new(err))
    }
}
