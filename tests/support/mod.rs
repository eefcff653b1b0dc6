// ABOUTME: Test support utilities.
// ABOUTME: In-memory scheduler and load balancer fakes driven by the same app state.

use async_trait::async_trait;
use http::StatusCode;
use marathon_bluegreen::bluegreen::labels;
use marathon_bluegreen::haproxy::{LoadBalancer, ProxyError, ProxySnapshot, ReplicaStatus};
use marathon_bluegreen::marathon::{Application, ClusterApi, ClusterError, DeploymentRef, Task};
use marathon_bluegreen::types::{AppId, DeploymentId, TaskId};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Once};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("marathon_bluegreen=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A mutating call recorded by `FakeCluster`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Create(String),
    Scale(String, u32),
    Destroy(String),
    Kill(Vec<String>),
}

#[derive(Default)]
struct ClusterState {
    apps: Vec<Application>,
    slots: Vec<String>,
    next_task: u32,
    next_deployment: u32,
    calls: Vec<Call>,
    active_deployments: HashSet<String>,
    fail_gets: u32,
    fail_scales: u32,
    fail_lists: bool,
}

/// In-memory scheduler. Scaling creates or removes tasks immediately and
/// every task is reported running and healthy.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

#[allow(dead_code)]
impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an application as if it had been deployed earlier.
    pub fn insert(&self, app: Application) {
        let mut state = self.state.lock();
        let mut app = app;
        let instances = app.instances;
        app.tasks.clear();
        resize(&mut state, &mut app, instances);
        state.apps.retain(|a| a.id != app.id);
        state.apps.push(app);
    }

    pub fn app(&self, id: &str) -> Option<Application> {
        self.state.lock().apps.iter().find(|a| a.id.as_str() == id).cloned()
    }

    pub fn app_ids(&self) -> Vec<String> {
        self.state.lock().apps.iter().map(|a| a.id.to_string()).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn destroy_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Destroy(_)))
            .count()
    }

    /// Make the next `n` reads of a single application fail.
    pub fn fail_next_gets(&self, n: u32) {
        self.state.lock().fail_gets = n;
    }

    /// Make the next `n` scale calls fail.
    pub fn fail_next_scales(&self, n: u32) {
        self.state.lock().fail_scales = n;
    }

    pub fn fail_lists(&self) {
        self.state.lock().fail_lists = true;
    }

    pub fn set_deployment_active(&self, id: &str, active: bool) {
        let mut state = self.state.lock();
        if active {
            state.active_deployments.insert(id.to_string());
        } else {
            state.active_deployments.remove(id);
        }
    }

    /// Report `app` as still deploying with `healthy` of its tasks healthy.
    pub fn set_pending(&self, id: &str, pending: bool, healthy: u32) {
        let mut state = self.state.lock();
        if let Some(app) = state.apps.iter_mut().find(|a| a.id.as_str() == id) {
            app.deployments = if pending {
                vec![DeploymentRef {
                    id: DeploymentId::new("pending"),
                }]
            } else {
                Vec::new()
            };
            app.tasks_healthy = healthy;
        }
    }

    /// Members of `group` in insertion order, oldest first.
    fn members(&self, group: &str) -> Vec<Application> {
        self.state
            .lock()
            .apps
            .iter()
            .filter(|a| a.label(labels::DEPLOYMENT_GROUP) == Some(group))
            .cloned()
            .collect()
    }
}

fn resize(state: &mut ClusterState, app: &mut Application, instances: u32) {
    let slot = match state.slots.iter().position(|s| s == app.id.as_str()) {
        Some(slot) => slot,
        None => {
            state.slots.push(app.id.to_string());
            state.slots.len() - 1
        }
    };

    app.tasks.truncate(instances as usize);
    while app.tasks.len() < instances as usize {
        state.next_task += 1;
        let n = state.next_task;
        app.tasks.push(Task {
            id: TaskId::new(format!("{}.{n}", app.id.trimmed())),
            app_id: app.id.clone(),
            host: format!("10.0.{}.{}", slot + 1, n % 250 + 1),
            ports: vec![31000 + n as u16],
            started_at: None,
        });
    }
    app.instances = instances;
    app.tasks_running = instances;
    app.tasks_healthy = instances;
    app.tasks_staged = 0;
}

fn not_found(id: &AppId) -> ClusterError {
    ClusterError::NotFound(id.to_string())
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_applications(&self) -> Result<Vec<Application>, ClusterError> {
        let state = self.state.lock();
        if state.fail_lists {
            return Err(ClusterError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "list failed".into(),
            });
        }
        Ok(state.apps.clone())
    }

    async fn get_application(&self, id: &AppId) -> Result<Application, ClusterError> {
        let mut state = self.state.lock();
        if state.fail_gets > 0 {
            state.fail_gets -= 1;
            return Err(ClusterError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "try again".into(),
            });
        }
        state
            .apps
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create_application(
        &self,
        app: &Application,
        _wait: bool,
        force: bool,
    ) -> Result<Application, ClusterError> {
        let mut state = self.state.lock();
        if !force && state.apps.iter().any(|a| a.id == app.id) {
            return Err(ClusterError::AlreadyExists(app.id.to_string()));
        }
        state.calls.push(Call::Create(app.id.to_string()));

        let mut created = app.clone();
        created.tasks.clear();
        resize(&mut state, &mut created, app.instances);
        state.apps.retain(|a| a.id != app.id);
        state.apps.push(created.clone());
        Ok(created)
    }

    async fn scale_application(
        &self,
        id: &AppId,
        instances: u32,
    ) -> Result<DeploymentId, ClusterError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Scale(id.to_string(), instances));
        if state.fail_scales > 0 {
            state.fail_scales -= 1;
            return Err(ClusterError::Status {
                status: StatusCode::CONFLICT,
                body: "app is locked by another deployment".into(),
            });
        }

        let index = state
            .apps
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| not_found(id))?;
        let mut app = state.apps[index].clone();
        resize(&mut state, &mut app, instances);
        state.apps[index] = app;

        state.next_deployment += 1;
        Ok(DeploymentId::new(format!("scale-{}", state.next_deployment)))
    }

    async fn destroy_application(&self, id: &AppId) -> Result<DeploymentId, ClusterError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Destroy(id.to_string()));
        let before = state.apps.len();
        state.apps.retain(|a| &a.id != id);
        if state.apps.len() == before {
            return Err(not_found(id));
        }
        state.next_deployment += 1;
        Ok(DeploymentId::new(format!("destroy-{}", state.next_deployment)))
    }

    async fn kill_tasks_and_scale(&self, tasks: &[TaskId]) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::Kill(tasks.iter().map(|t| t.to_string()).collect()));
        for app in &mut state.apps {
            let before = app.tasks.len();
            app.tasks.retain(|t| !tasks.contains(&t.id));
            let killed = (before - app.tasks.len()) as u32;
            app.instances -= killed;
            app.tasks_running -= killed;
            app.tasks_healthy -= killed;
        }
        Ok(())
    }

    async fn has_deployment(&self, id: &DeploymentId) -> Result<bool, ClusterError> {
        Ok(self.state.lock().active_deployments.contains(id.as_str()))
    }
}

#[allow(dead_code)]
struct ProxyState {
    alive: bool,
    replicas: usize,
    pids: VecDeque<usize>,
    fail_snapshots: u32,
    busy_snapshots: u32,
    snapshots: u32,
}

#[allow(dead_code)]
/// Load balancer whose stats feed mirrors `FakeCluster`.
///
/// For a group with two members the newest one is taken as the rollout
/// target. Of the old application's tasks, `new + old - target` (at most
/// all of them) are reported in maintenance, the rest up.
pub struct FakeLoadBalancer {
    cluster: Arc<FakeCluster>,
    group: String,
    state: Mutex<ProxyState>,
}

#[allow(dead_code)]
impl FakeLoadBalancer {
    pub fn new(cluster: Arc<FakeCluster>, group: &str) -> Self {
        Self {
            cluster,
            group: group.to_string(),
            state: Mutex::new(ProxyState {
                alive: true,
                replicas: 1,
                pids: VecDeque::new(),
                fail_snapshots: 0,
                busy_snapshots: 0,
                snapshots: 0,
            }),
        }
    }

    pub fn with_replicas(self, replicas: usize) -> Self {
        self.state.lock().replicas = replicas;
        self
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.lock().alive = alive;
    }

    /// Process counts reported by the first replica on successive snapshots.
    pub fn script_pids(&self, pids: &[usize]) {
        self.state.lock().pids.extend(pids.iter().copied());
    }

    pub fn fail_next_snapshots(&self, n: u32) {
        self.state.lock().fail_snapshots = n;
    }

    /// Report sessions on drained backends for the next `n` snapshots.
    pub fn keep_sessions_for(&self, n: u32) {
        self.state.lock().busy_snapshots = n;
    }

    pub fn snapshot_count(&self) -> u32 {
        self.state.lock().snapshots
    }

    fn unavailable() -> ProxyError {
        ProxyError::Status {
            url: "http://lb.test:9090/haproxy?stats;csv".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn replica_csv(&self, members: &[Application], busy: bool) -> String {
        let mut csv = String::from("# pxname,svname,qcur,scur,status\n");
        csv.push_str("stats,FRONTEND,0,0,OPEN\n");
        csv.push_str("other_80,10_9_9_9_31000,0,4,MAINT\n");

        let Some(newest) = members.last() else {
            return csv;
        };
        let Some(port) = newest.label(labels::PROXY_PORT) else {
            return csv;
        };
        let backend = format!("{}_{port}", self.group);
        csv.push_str(&format!("{backend},FRONTEND,0,0,OPEN\n"));

        let mut row = |task: &Task, status: &str, scur: u32| {
            let svname = format!("{}_{}", task.host.replace('.', "_"), task.ports[0]);
            csv.push_str(&format!("{backend},{svname},0,{scur},{status}\n"));
        };

        if let [old, new] = members {
            let target: u32 = new
                .label(labels::TARGET_INSTANCES)
                .and_then(|v| v.parse().ok())
                .unwrap_or(new.instances);
            let drained = (new.instances + old.instances)
                .saturating_sub(target)
                .min(old.instances) as usize;
            for (i, task) in old.tasks.iter().enumerate() {
                if i < drained {
                    row(task, "MAINT", u32::from(busy));
                } else {
                    row(task, "UP", 0);
                }
            }
        }
        for task in &newest.tasks {
            row(task, "UP", 0);
        }

        csv.push_str(&format!("{backend},BACKEND,0,0,UP\n"));
        csv
    }
}

#[async_trait]
impl LoadBalancer for FakeLoadBalancer {
    async fn is_alive(&self) -> Result<(), ProxyError> {
        if self.state.lock().alive {
            Ok(())
        } else {
            Err(Self::unavailable())
        }
    }

    async fn snapshot(&self) -> Result<ProxySnapshot, ProxyError> {
        let members = self.cluster.members(&self.group);
        let mut state = self.state.lock();
        state.snapshots += 1;
        if state.fail_snapshots > 0 {
            state.fail_snapshots -= 1;
            return Err(Self::unavailable());
        }

        let busy = state.busy_snapshots > 0;
        state.busy_snapshots = state.busy_snapshots.saturating_sub(1);
        let first_pids = state.pids.pop_front().unwrap_or(1);

        let mut snapshot = ProxySnapshot::default();
        for replica in 0..state.replicas {
            snapshot.csv.push_str(&self.replica_csv(&members, busy));
            snapshot.replicas.push(ReplicaStatus {
                address: format!("http://10.1.0.{}:9090", replica + 1),
                pids: if replica == 0 { first_pids } else { 1 },
            });
        }
        Ok(snapshot)
    }
}

/// A rollout descriptor for group `web` with proxy port 10000 and
/// alternate port 10001.
#[allow(dead_code)]
pub fn web_app(instances: u32) -> Application {
    let mut app = Application {
        instances,
        ports: vec![10000],
        ..Application::new("/web")
    };
    app.labels
        .insert(labels::DEPLOYMENT_GROUP.into(), "web".into());
    app.labels
        .insert(labels::DEPLOYMENT_ALT_PORT.into(), "10001".into());
    app
}

/// An application already serving group `web` on `port`.
#[allow(dead_code)]
pub fn live_web_app(colour: &str, port: u16, instances: u32, started_at: &str) -> Application {
    let mut app = web_app(instances);
    app.id = AppId::new(format!("/web-{colour}"));
    app.ports = vec![port];
    app.labels
        .insert(labels::DEPLOYMENT_COLOUR.into(), colour.into());
    app.labels.insert(labels::PROXY_PORT.into(), "10000".into());
    app.labels
        .insert(labels::TARGET_INSTANCES.into(), instances.to_string());
    app.labels
        .insert(labels::STARTED_AT.into(), started_at.into());
    app.labels.insert(labels::APP_ID.into(), "/web".into());
    app
}
