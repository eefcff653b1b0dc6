// ABOUTME: Cluster scheduler abstraction and its Marathon implementation.
// ABOUTME: Exposes the ClusterApi trait consumed by the blue/green engine.

mod client;
mod error;
mod types;
pub mod wait;

pub use client::{MarathonClient, MarathonClientConfig};
pub use error::{ClusterError, WaitError};
pub use types::{
    Application, Container, Deploy, DeploymentRef, DeploymentResult, Docker, HealthCheck,
    PortMapping, Task,
};
pub use wait::Waiter;

use crate::types::{AppId, DeploymentId, TaskId};
use async_trait::async_trait;

/// Operations the blue/green engine needs from the cluster scheduler.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every application known to the scheduler, tasks included.
    async fn list_applications(&self) -> Result<Vec<Application>, ClusterError>;

    /// Fetch one application with its tasks.
    async fn get_application(&self, id: &AppId) -> Result<Application, ClusterError>;

    /// Create an application.
    ///
    /// With `wait` the call blocks until the application has no pending
    /// deployment and every task is healthy. With `force` an existing
    /// application of the same id is updated instead of rejected.
    async fn create_application(
        &self,
        app: &Application,
        wait: bool,
        force: bool,
    ) -> Result<Application, ClusterError>;

    /// Change the desired instance count.
    async fn scale_application(
        &self,
        id: &AppId,
        instances: u32,
    ) -> Result<DeploymentId, ClusterError>;

    async fn destroy_application(&self, id: &AppId) -> Result<DeploymentId, ClusterError>;

    /// Kill tasks and decrement their application's instance count by one
    /// per killed task.
    async fn kill_tasks_and_scale(&self, tasks: &[TaskId]) -> Result<(), ClusterError>;

    /// Whether `id` is still listed among the active deployments.
    async fn has_deployment(&self, id: &DeploymentId) -> Result<bool, ClusterError>;
}
