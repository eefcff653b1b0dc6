// ABOUTME: Top-level blue/green rollout: validate, probe, create, then drain.
// ABOUTME: Always re-reads the new application from the cluster before returning.

use super::drain::{DrainController, DrainReport};
use super::labels::{self, DeploymentLabels};
use super::probe::{AppState, probe};
use super::{BlueGreenError, BlueGreenOptions};
use crate::descriptor::{self, DescriptorOptions};
use crate::haproxy::LoadBalancer;
use crate::marathon::{Application, ClusterApi};
use crate::types::DeploymentGroup;
use chrono::Utc;
use std::path::Path;
use tokio::sync::watch;
use tracing::info;

/// Result of a rollout.
#[derive(Debug)]
pub struct Rollout {
    /// The new application. In dry-run mode this is the definition that
    /// would have been submitted; otherwise the scheduler's current view.
    pub app: Application,
    /// Present when an existing application was drained.
    pub drain: Option<DrainReport>,
}

/// Blue/green deployer bound to one scheduler and one load balancer.
pub struct BlueGreen<'a, C: ?Sized, L: ?Sized> {
    cluster: &'a C,
    proxy: &'a L,
    options: BlueGreenOptions,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a, C, L> BlueGreen<'a, C, L>
where
    C: ClusterApi + ?Sized,
    L: LoadBalancer + ?Sized,
{
    pub fn new(cluster: &'a C, proxy: &'a L, options: BlueGreenOptions) -> Self {
        Self {
            cluster,
            proxy,
            options,
            shutdown: None,
        }
    }

    /// Stop waiting and draining once `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn options(&self) -> &BlueGreenOptions {
        &self.options
    }

    /// Load an application descriptor and roll it out.
    pub async fn deploy_from_file(&self, path: &Path) -> Result<Rollout, BlueGreenError> {
        let opts = DescriptorOptions {
            error_on_missing_params: self.options.error_on_missing_params,
            params: &self.options.env_params,
        };
        let app = descriptor::load_application(path, &opts)?;
        self.deploy(app).await
    }

    /// Roll `app` out next to the live application of its deployment group
    /// and drain the old one.
    ///
    /// Nothing in the cluster changes unless every validation passes and
    /// the group has no conflicting rollout in progress.
    pub async fn deploy(&self, mut app: Application) -> Result<Rollout, BlueGreenError> {
        self.proxy
            .is_alive()
            .await
            .map_err(BlueGreenError::ProxyUnavailable)?;

        if app.labels.is_empty() {
            return Err(BlueGreenError::NoLabels);
        }
        let group = app
            .label(labels::DEPLOYMENT_GROUP)
            .ok_or(BlueGreenError::MissingLabel(labels::DEPLOYMENT_GROUP))?;
        let group = DeploymentGroup::new(group)?;
        if app.label(labels::DEPLOYMENT_ALT_PORT).is_none() {
            return Err(BlueGreenError::MissingLabel(labels::DEPLOYMENT_ALT_PORT));
        }
        let requested = DeploymentLabels::from_labels(&app.labels)?;
        let alt_port = requested
            .alt_port
            .ok_or(BlueGreenError::MissingLabel(labels::DEPLOYMENT_ALT_PORT))?;
        let service_port = app.service_port().ok_or(BlueGreenError::NoServicePort)?;

        let original_id = app.id.clone();
        let state = self.probe(&group, alt_port).await?;

        app.set_service_port(state.next_port);
        app.id = original_id.coloured(state.colour);

        let target_instances = match &state.existing_app {
            Some(existing) => {
                app.instances = self.options.initial_instances;
                existing.instances
            }
            None => app.instances,
        };

        DeploymentLabels {
            colour: Some(state.colour),
            proxy_port: Some(service_port),
            target_instances: Some(target_instances),
            started_at: Some(Utc::now().fixed_offset()),
            app_id: Some(original_id),
            ..Default::default()
        }
        .apply_to(&mut app.labels);

        info!(
            app = %app.id,
            colour = %state.colour,
            port = state.next_port,
            target_instances,
            resuming = state.resuming,
            "prepared blue/green deployment"
        );

        if self.options.dry_run {
            return Ok(Rollout { app, drain: None });
        }

        if !state.resuming {
            self.cluster.create_application(&app, true, false).await?;
        }

        let drain = match &state.existing_app {
            Some(existing) => {
                let mut controller = DrainController::new(self.cluster, self.proxy, &self.options);
                if let Some(rx) = &self.shutdown {
                    controller = controller.with_shutdown(rx.clone());
                }
                Some(controller.drain(&app.id, &existing.id).await)
            }
            None => None,
        };

        let app = self.cluster.get_application(&app.id).await?;
        Ok(Rollout { app, drain })
    }

    /// Inspect the cluster for `group` without changing anything.
    pub async fn probe(
        &self,
        group: &DeploymentGroup,
        alt_port: u16,
    ) -> Result<AppState, BlueGreenError> {
        probe(self.cluster, group.as_str(), alt_port, self.options.resume).await
    }
}
