// ABOUTME: Load balancer error types with SNAFU pattern.
// ABOUTME: Covers bad stats URLs and failed or rejected replica queries.

use crate::http::HttpError;
use http::StatusCode;
use snafu::Snafu;

/// Failure talking to the load balancer's stats endpoints.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProxyError {
    #[snafu(display("invalid load balancer url '{url}': {source}"))]
    InvalidUrl {
        url: String,
        source: http::uri::InvalidUri,
    },

    #[snafu(display("load balancer url '{url}' has no host"))]
    MissingHost { url: String },

    #[snafu(display("request to {url} failed: {source}"))]
    Request { url: String, source: HttpError },

    #[snafu(display("{url} returned {status}"))]
    Status { url: String, status: StatusCode },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyErrorKind {
    /// The configured URL cannot be used.
    Configuration,
    /// A replica could not be reached or answered with an error.
    Unavailable,
}

impl ProxyError {
    pub fn kind(&self) -> ProxyErrorKind {
        match self {
            ProxyError::InvalidUrl { .. } | ProxyError::MissingHost { .. } => {
                ProxyErrorKind::Configuration
            }
            ProxyError::Request { .. } | ProxyError::Status { .. } => ProxyErrorKind::Unavailable,
        }
    }
}
