// ABOUTME: Iterative drain loop moving traffic from the old to the new application.
// ABOUTME: Scales up the new app and kills drained old tasks until the old app can go.

use super::BlueGreenOptions;
use super::labels::DeploymentLabels;
use crate::diagnostics::{Diagnostics, Warning};
use crate::haproxy::stats::{COLUMN_QCUR, COLUMN_SCUR, STATUS_MAINT, STATUS_UP};
use crate::haproxy::{LoadBalancer, ProxyInfo};
use crate::marathon::wait::pause;
use crate::marathon::{Application, ClusterApi, Task};
use crate::types::{AppId, TaskId};
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// How a drain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The old application was destroyed.
    Converged,
    /// The drain cannot continue.
    Aborted(String),
    /// The shutdown signal fired.
    Cancelled,
    /// The configured drain deadline passed.
    DeadlineExceeded,
}

impl DrainOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, DrainOutcome::Converged)
    }
}

#[derive(Debug)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Scale-and-kill rounds issued.
    pub steps: u32,
    pub diagnostics: Diagnostics,
}

/// Why an iteration made no change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Backend rows do not match the scheduler's instance counts yet.
    ProxyNotSynced,
    /// Fewer healthy backends than the target.
    InsufficientCapacity,
    /// No backend is in maintenance.
    NothingDraining,
    /// A backend in maintenance still has queued requests or sessions.
    DrainInProgress,
}

/// Decision taken from one consistent view of cluster and load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Wait(WaitReason),
    /// Every old task is drained and the new app is at target.
    Destroy,
    /// Grow the new app to `instances` and kill the drained old `tasks`.
    ScaleAndKill { instances: u32, tasks: Vec<TaskId> },
}

/// Decide the next step for a drain of `old_app` into `new_app`.
pub fn plan_step(new_app: &Application, old_app: &Application, target: u32, info: &ProxyInfo) -> Step {
    let expected = (new_app.instances + old_app.instances) as usize;
    match info.per_instance(info.backends().len()) {
        Some(rows) if rows == expected => {}
        _ => return Step::Wait(WaitReason::ProxyNotSynced),
    }

    let up = info.backends_with_status(STATUS_UP);
    if info.per_instance(up.len()).unwrap_or(0) < target as usize {
        return Step::Wait(WaitReason::InsufficientCapacity);
    }

    let drained = info.backends_with_status(STATUS_MAINT);
    if info.per_instance(drained.len()).unwrap_or(0) < 1 {
        return Step::Wait(WaitReason::NothingDraining);
    }

    let busy = drained
        .iter()
        .any(|row| info.int_field(row, COLUMN_QCUR) > 0 || info.int_field(row, COLUMN_SCUR) > 0);
    if busy {
        return Step::Wait(WaitReason::DrainInProgress);
    }

    let host_ports = info.host_ports(&drained);
    let tasks = tasks_to_kill(&old_app.tasks, &host_ports);

    if new_app.instances == target && tasks.len() == old_app.instances as usize {
        return Step::Destroy;
    }

    Step::ScaleAndKill {
        instances: next_instances(new_app.instances, old_app.instances, target),
        tasks,
    }
}

/// Grow by half (rounded up), jumping straight to `target` once the new
/// app would be as large as the old one.
pub fn next_instances(current: u32, old: u32, target: u32) -> u32 {
    let mut next = current + current.div_ceil(2);
    if next >= old {
        next = target;
    }
    next.min(target)
}

/// Old tasks listening on a drained host/port, each listed once.
pub fn tasks_to_kill(tasks: &[Task], host_ports: &HashMap<Ipv4Addr, BTreeSet<u16>>) -> Vec<TaskId> {
    let mut seen = BTreeSet::new();
    tasks
        .iter()
        .filter(|task| {
            task.host
                .parse::<Ipv4Addr>()
                .ok()
                .and_then(|host| host_ports.get(&host))
                .is_some_and(|ports| task.ports.iter().any(|p| ports.contains(p)))
        })
        .filter(|task| seen.insert(task.id.clone()))
        .map(|task| task.id.clone())
        .collect()
}

/// Moves a deployment group from its old application to the new one.
pub struct DrainController<'a, C: ?Sized, L: ?Sized> {
    cluster: &'a C,
    proxy: &'a L,
    options: &'a BlueGreenOptions,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a, C, L> DrainController<'a, C, L>
where
    C: ClusterApi + ?Sized,
    L: LoadBalancer + ?Sized,
{
    pub fn new(cluster: &'a C, proxy: &'a L, options: &'a BlueGreenOptions) -> Self {
        Self {
            cluster,
            proxy,
            options,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run until the old application is destroyed or the drain stops.
    ///
    /// Every iteration sleeps one step delay, then re-reads both
    /// applications and every load-balancer replica. Transient failures and
    /// inconsistent views retry the iteration; only missing rollout labels,
    /// a failed destroy, cancellation or the optional deadline end it early.
    pub async fn drain(&self, new_id: &AppId, old_id: &AppId) -> DrainReport {
        let deadline = self.options.drain_deadline.map(|d| Instant::now() + d);
        let mut step_started = Instant::now();
        let mut diagnostics = Diagnostics::default();
        let mut steps = 0;

        let outcome = loop {
            if pause(self.options.step_delay, self.shutdown.as_ref()).await {
                break DrainOutcome::Cancelled;
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                break DrainOutcome::DeadlineExceeded;
            }

            let (old_app, new_app) = match futures::try_join!(
                self.cluster.get_application(old_id),
                self.cluster.get_application(new_id)
            ) {
                Ok(apps) => apps,
                Err(e) => {
                    diagnostics.warn(Warning::refresh_failed(format!(
                        "failed to refresh applications: {e}"
                    )));
                    continue;
                }
            };

            let labels = match DeploymentLabels::from_labels(&new_app.labels) {
                Ok(labels) => labels,
                Err(e) => break DrainOutcome::Aborted(e.to_string()),
            };
            let (Some(target), Some(backend)) = (labels.target_instances, labels.backend_name())
            else {
                break DrainOutcome::Aborted(format!(
                    "{new_id} is missing its deployment group, proxy port or target instances label"
                ));
            };

            info!(
                old = old_app.instances,
                new = new_app.instances,
                target,
                "refreshed application state"
            );

            let snapshot = match self.proxy.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    diagnostics.warn(Warning::proxy_query_failed(format!(
                        "failed to query load balancer stats: {e}"
                    )));
                    continue;
                }
            };

            if let Some(replica) = snapshot.reloading_replica()
                && step_started.elapsed() < self.options.proxy_wait_timeout
            {
                info!(
                    replica = %replica.address,
                    pids = replica.pids,
                    "load balancer is reloading, waiting"
                );
                continue;
            }

            let proxy_info = ProxyInfo::parse(&snapshot.csv, &backend);
            match plan_step(&new_app, &old_app, target, &proxy_info) {
                Step::Wait(reason) => {
                    debug!(?reason, backend = %backend, "drain not ready");
                }
                Step::Destroy => {
                    info!(app = %old_id, "all backends drained, destroying old application");
                    match self.cluster.destroy_application(old_id).await {
                        Ok(_) => break DrainOutcome::Converged,
                        Err(e) => {
                            break DrainOutcome::Aborted(format!("failed to destroy {old_id}: {e}"));
                        }
                    }
                }
                Step::ScaleAndKill { instances, tasks } => {
                    steps += 1;
                    info!(
                        app = %new_id,
                        instances,
                        drained = tasks.len(),
                        "scaling new app up and killing drained tasks"
                    );
                    self.scale_and_kill(new_id, instances, &tasks, &mut diagnostics)
                        .await;
                    step_started = Instant::now();
                }
            }
        };

        info!(?outcome, steps, "drain finished");
        DrainReport {
            outcome,
            steps,
            diagnostics,
        }
    }

    async fn scale_and_kill(
        &self,
        new_id: &AppId,
        instances: u32,
        tasks: &[TaskId],
        diagnostics: &mut Diagnostics,
    ) {
        if let Err(e) = self.cluster.scale_application(new_id, instances).await {
            diagnostics.warn(Warning::scale_failed(format!(
                "failed to scale {new_id} to {instances}: {e}"
            )));
            return;
        }
        if tasks.is_empty() {
            return;
        }
        if let Err(e) = self.cluster.kill_tasks_and_scale(tasks).await {
            diagnostics.warn(Warning::kill_tasks_failed(format!(
                "failed to kill {} drained tasks: {e}",
                tasks.len()
            )));
        }
    }
}
