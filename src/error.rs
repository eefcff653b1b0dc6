// ABOUTME: Application-wide error types for marathon-bluegreen.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::bluegreen::BlueGreenError;
use crate::descriptor::DescriptorError;
use crate::haproxy::ProxyError;
use crate::marathon::ClusterError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    BlueGreen(#[from] BlueGreenError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("drain did not converge: {0}")]
    DrainIncomplete(String),
}

pub type Result<T> = std::result::Result<T, Error>;
