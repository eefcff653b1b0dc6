// ABOUTME: Error types for blue/green rollouts.
// ABOUTME: Validation and conflict failures happen before any cluster mutation.

use super::labels::{self, LabelError};
use crate::descriptor::DescriptorError;
use crate::haproxy::ProxyError;
use crate::marathon::ClusterError;
use crate::types::DeploymentGroupError;

#[derive(Debug, thiserror::Error)]
pub enum BlueGreenError {
    #[error("load balancer is not responding, invalid, or stats are not enabled: {0}")]
    ProxyUnavailable(#[source] ProxyError),

    #[error(
        "no labels found, please define the {} and {} labels",
        labels::DEPLOYMENT_GROUP,
        labels::DEPLOYMENT_ALT_PORT
    )]
    NoLabels,

    #[error("please define the {0} label")]
    MissingLabel(&'static str),

    #[error(transparent)]
    InvalidLabel(#[from] LabelError),

    #[error("invalid deployment group: {0}")]
    InvalidGroup(#[from] DeploymentGroupError),

    #[error("no service port set")]
    NoServicePort,

    #[error("there appears to be an existing deployment in progress for group '{0}'")]
    DeploymentInProgress(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueGreenErrorKind {
    /// Bad input or unreachable load balancer; nothing was changed.
    Validation,
    /// Another rollout of the same group is in progress.
    Conflict,
    /// The scheduler rejected or failed a call.
    Cluster,
    /// The application descriptor could not be loaded.
    Descriptor,
}

impl BlueGreenError {
    pub fn kind(&self) -> BlueGreenErrorKind {
        match self {
            BlueGreenError::ProxyUnavailable(_)
            | BlueGreenError::NoLabels
            | BlueGreenError::MissingLabel(_)
            | BlueGreenError::InvalidLabel(_)
            | BlueGreenError::InvalidGroup(_)
            | BlueGreenError::NoServicePort => BlueGreenErrorKind::Validation,
            BlueGreenError::DeploymentInProgress(_) => BlueGreenErrorKind::Conflict,
            BlueGreenError::Cluster(_) => BlueGreenErrorKind::Cluster,
            BlueGreenError::Descriptor(_) => BlueGreenErrorKind::Descriptor,
        }
    }
}
