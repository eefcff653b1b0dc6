// ABOUTME: Marathon application, task and deployment wire types.
// ABOUTME: Unknown fields are kept so descriptors round-trip through updates.

use crate::types::{AppId, DeploymentId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A Marathon application definition plus the runtime state Marathon
/// reports alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: AppId,

    #[serde(default)]
    pub instances: u32,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheck>,

    #[serde(default, skip_serializing)]
    pub tasks: Vec<Task>,

    #[serde(default, skip_serializing)]
    pub deployments: Vec<DeploymentRef>,

    #[serde(default, skip_serializing)]
    pub tasks_running: u32,

    #[serde(default, skip_serializing)]
    pub tasks_staged: u32,

    #[serde(default, skip_serializing)]
    pub tasks_healthy: u32,

    #[serde(default, skip_serializing)]
    pub tasks_unhealthy: u32,

    #[serde(default, skip_serializing)]
    pub version: Option<String>,

    /// Every other field of the descriptor (cmd, cpus, mem, env, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Application {
    pub fn new(id: impl Into<AppId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// The service port the load balancer exposes for this application.
    ///
    /// A docker port mapping wins over the plain `ports` list. Zero means
    /// no service port is assigned.
    pub fn service_port(&self) -> Option<u16> {
        let mapped = self
            .container
            .as_ref()
            .and_then(|c| c.docker.as_ref())
            .and_then(|d| d.port_mappings.first())
            .map(|m| m.service_port);

        match mapped {
            Some(port) if port > 0 => Some(port),
            Some(_) => None,
            None => self.ports.first().copied().filter(|p| *p > 0),
        }
    }

    /// Point the first service port (and docker port mapping) at `port`.
    pub fn set_service_port(&mut self, port: u16) {
        if let Some(mapping) = self
            .container
            .as_mut()
            .and_then(|c| c.docker.as_mut())
            .and_then(|d| d.port_mappings.first_mut())
        {
            mapping.service_port = port;
        }
        if let Some(first) = self.ports.first_mut() {
            *first = port;
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Longest health check grace period, if any health check is declared.
    pub fn max_grace_period(&self) -> Option<u64> {
        self.health_checks
            .iter()
            .map(|h| h.grace_period_seconds)
            .max()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<Docker>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default)]
    pub container_port: u16,

    #[serde(default)]
    pub host_port: u16,

    #[serde(default)]
    pub service_port: u16,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_grace_period() -> u64 {
    300
}

/// A running (or staged) instance of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    #[serde(default)]
    pub app_id: AppId,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub ports: Vec<u16>,

    #[serde(default)]
    pub started_at: Option<String>,
}

/// Reference to an in-flight deployment embedded in an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRef {
    pub id: DeploymentId,
}

/// Response of mutating calls (`PUT`/`DELETE /v2/apps/{id}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub deployment_id: DeploymentId,
    #[serde(default)]
    pub version: Option<String>,
}

/// Entry of `GET /v2/deployments`.
#[derive(Debug, Clone, Deserialize)]
pub struct Deploy {
    pub id: DeploymentId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppsEnvelope {
    pub apps: Vec<Application>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppEnvelope {
    pub app: Application,
}
