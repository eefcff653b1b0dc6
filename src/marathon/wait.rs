// ABOUTME: Polling waits for scheduler deployments and application health.
// ABOUTME: Fixed two second poll interval, bounded by a caller-supplied deadline.

use super::{ClusterApi, WaitError};
use crate::types::{AppId, DeploymentId};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between two polls of the scheduler.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Blocks until a scheduler-side condition holds or a deadline passes.
///
/// `wait_for_deployment` and `wait_for_application` treat read errors as
/// "not yet" and keep polling. `wait_for_application_healthy` returns the
/// first read error it sees. Callers rely on both behaviours, so they are
/// kept distinct.
pub struct Waiter<'a, C: ?Sized> {
    cluster: &'a C,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a, C: ClusterApi + ?Sized> Waiter<'a, C> {
    pub fn new(cluster: &'a C) -> Self {
        Self {
            cluster,
            shutdown: None,
        }
    }

    /// Abort the wait with `WaitError::Cancelled` once `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Wait until `id` disappears from the scheduler's active deployments.
    pub async fn wait_for_deployment(
        &self,
        id: &DeploymentId,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let started = Instant::now();
        let deadline = started + timeout;
        info!(deployment = %id, "waiting for deployment");

        loop {
            if Instant::now() > deadline {
                return Err(WaitError::Timeout(timeout));
            }

            match self.cluster.has_deployment(id).await {
                Ok(false) => {
                    info!(
                        deployment = %id,
                        elapsed = ?started.elapsed(),
                        "deployment has completed"
                    );
                    return Ok(());
                }
                Ok(true) => debug!(deployment = %id, "deployment still active"),
                Err(e) => debug!(deployment = %id, error = %e, "deployment lookup failed"),
            }

            self.tick().await?;
        }
    }

    /// Wait until the application reports no pending deployment, then for
    /// every task to be healthy if it declares health checks.
    pub async fn wait_for_application(
        &self,
        id: &AppId,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let started = Instant::now();
        let deadline = started + timeout;
        info!(app = %id, "waiting for application deployment to complete");

        loop {
            if Instant::now() > deadline {
                return Err(WaitError::Timeout(timeout));
            }

            match self.cluster.get_application(id).await {
                Ok(app) if app.deployments.is_empty() => {
                    info!(
                        app = %id,
                        elapsed = ?started.elapsed(),
                        "application deployment has completed"
                    );
                    if app.health_checks.is_empty() {
                        warn!(app = %id, "no health checks defined, not waiting for healthy state");
                        return Ok(());
                    }
                    return self.wait_for_application_healthy(id, timeout).await;
                }
                Ok(app) => debug!(
                    app = %id,
                    pending = app.deployments.len(),
                    "application deployment in progress"
                ),
                Err(e) => debug!(app = %id, error = %e, "application lookup failed"),
            }

            self.tick().await?;
        }
    }

    /// Wait until `tasksHealthy == tasksStaged + tasksRunning`.
    pub async fn wait_for_application_healthy(
        &self,
        id: &AppId,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            if Instant::now() > deadline {
                return Err(WaitError::Timeout(timeout));
            }

            let app = self.cluster.get_application(id).await?;
            let total = app.tasks_staged + app.tasks_running;
            if app.tasks_healthy == total {
                info!(
                    app = %id,
                    healthy = app.tasks_healthy,
                    elapsed = ?started.elapsed(),
                    "all instances are healthy"
                );
                return Ok(());
            }

            debug!(
                app = %id,
                healthy = app.tasks_healthy,
                expected = total,
                "waiting for instances to become healthy"
            );
            self.tick().await?;
        }
    }

    async fn tick(&self) -> Result<(), WaitError> {
        if pause(POLL_INTERVAL, self.shutdown.as_ref()).await {
            return Err(WaitError::Cancelled);
        }
        Ok(())
    }
}

/// Sleep for `duration` unless `shutdown` fires first.
///
/// Returns true when the sleep was cut short by cancellation. A dropped
/// sender never counts as cancellation.
pub(crate) async fn pause(duration: Duration, shutdown: Option<&watch::Receiver<bool>>) -> bool {
    let Some(rx) = shutdown else {
        tokio::time::sleep(duration).await;
        return false;
    };

    if *rx.borrow() {
        return true;
    }

    let mut rx = rx.clone();
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        Ok(_) = rx.wait_for(|cancelled| *cancelled) => true,
    }
}
