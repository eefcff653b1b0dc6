// ABOUTME: Marathon REST client implementing ClusterApi over plain HTTP.
// ABOUTME: Handles auth headers, status mapping and create-then-wait semantics.

use super::types::{AppEnvelope, AppsEnvelope, Application, Deploy, DeploymentResult};
use super::{ClusterApi, ClusterError, Waiter};
use crate::http::{HttpClient, HttpResponse};
use crate::types::{AppId, DeploymentId, TaskId};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::HeaderValue;
use http::{Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Wait bound used when neither a configured timeout nor a longer
/// health-check grace period applies.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection settings for a Marathon endpoint.
#[derive(Debug, Clone)]
pub struct MarathonClientConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// DC/OS ACS token, sent as `Authorization: token=<value>`.
    pub token: Option<String>,
    pub request_timeout: Duration,
    /// Overrides the computed create/update wait timeout.
    pub wait_timeout: Option<Duration>,
}

impl MarathonClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            token: None,
            request_timeout: Duration::from_secs(30),
            wait_timeout: None,
        }
    }
}

pub struct MarathonClient {
    base: String,
    http: HttpClient,
    wait_timeout: Option<Duration>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl MarathonClient {
    pub fn new(config: MarathonClientConfig) -> Result<Self, ClusterError> {
        let base = config.url.trim_end_matches('/').to_string();
        base.parse::<Uri>()
            .map_err(|e| ClusterError::InvalidUrl(format!("{}: {e}", config.url)))?;

        let mut http = HttpClient::new(config.request_timeout);
        if let Some(auth) = authorization(&config)? {
            http = http.with_authorization(auth);
        }

        Ok(Self {
            base,
            http,
            wait_timeout: config.wait_timeout,
            shutdown: None,
        })
    }

    /// Cancel create/update waits when `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Update an existing application in place, optionally waiting for the
    /// resulting deployment and for the application to become healthy.
    pub async fn update_application(
        &self,
        app: &Application,
        wait: bool,
    ) -> Result<Application, ClusterError> {
        info!(app = %app.id, wait, "updating application");

        let mut body = serde_json::to_value(app)?;
        if let Some(fields) = body.as_object_mut() {
            fields.remove("id");
        }

        let path = app_path(&app.id);
        let resp = self
            .send(Method::PUT, &path, Some(serde_json::to_vec(&body)?.into()))
            .await?;
        if resp.status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ClusterError::NotFound(app.id.to_string()));
        }
        let result: DeploymentResult = decode(&path, resp)?;

        if wait {
            let timeout = self.determine_timeout(app);
            let waiter = self.waiter();
            waiter
                .wait_for_deployment(&result.deployment_id, timeout)
                .await?;
            waiter.wait_for_application(&app.id, timeout).await?;
        }

        self.get_application(&app.id).await
    }

    /// Wait bound for create/update: the configured timeout, else the longest
    /// health-check grace period with a 90 second floor.
    pub fn determine_timeout(&self, app: &Application) -> Duration {
        if let Some(timeout) = self.wait_timeout {
            return timeout;
        }
        app.max_grace_period()
            .map(Duration::from_secs)
            .map_or(DEFAULT_WAIT_TIMEOUT, |grace| grace.max(DEFAULT_WAIT_TIMEOUT))
    }

    fn waiter(&self) -> Waiter<'_, Self> {
        let waiter = Waiter::new(self);
        match &self.shutdown {
            Some(rx) => waiter.with_shutdown(rx.clone()),
            None => waiter,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, ClusterError> {
        let url = format!("{}/{}", self.base, path);
        let uri: Uri = url
            .parse()
            .map_err(|e| ClusterError::InvalidUrl(format!("{url}: {e}")))?;
        let resp = self.http.send(method, &uri, body).await?;
        if resp.status == StatusCode::NOT_FOUND {
            return Err(ClusterError::NotFound(path.to_string()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ClusterApi for MarathonClient {
    async fn list_applications(&self) -> Result<Vec<Application>, ClusterError> {
        let resp = self.send(Method::GET, "v2/apps", None).await?;
        let envelope: AppsEnvelope = decode("v2/apps", resp)?;
        Ok(envelope.apps)
    }

    async fn get_application(&self, id: &AppId) -> Result<Application, ClusterError> {
        let path = app_path(id);
        let resp = self.send(Method::GET, &path, None).await?;
        let envelope: AppEnvelope = decode(&path, resp)?;
        Ok(envelope.app)
    }

    async fn create_application(
        &self,
        app: &Application,
        wait: bool,
        force: bool,
    ) -> Result<Application, ClusterError> {
        info!(app = %app.id, wait, force, "creating application");

        let body = serde_json::to_vec(app)?;
        let resp = self.send(Method::POST, "v2/apps", Some(body.into())).await?;

        match resp.status {
            StatusCode::CONFLICT if force => return self.update_application(app, wait).await,
            StatusCode::CONFLICT => return Err(ClusterError::AlreadyExists(app.id.to_string())),
            StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(ClusterError::InvalidId(app.id.to_string()));
            }
            _ => {}
        }
        let created: Application = decode("v2/apps", resp)?;

        if wait {
            self.waiter()
                .wait_for_application(&created.id, self.determine_timeout(app))
                .await?;
        }

        match self.get_application(&created.id).await {
            Ok(latest) => Ok(latest),
            Err(e) => {
                debug!(app = %created.id, error = %e, "refresh after create failed");
                Ok(created)
            }
        }
    }

    async fn scale_application(
        &self,
        id: &AppId,
        instances: u32,
    ) -> Result<DeploymentId, ClusterError> {
        info!(app = %id, instances, "scaling application");
        let path = app_path(id);
        let body = serde_json::to_vec(&serde_json::json!({ "instances": instances }))?;
        let resp = self.send(Method::PUT, &path, Some(body.into())).await?;
        let result: DeploymentResult = decode(&path, resp)?;
        Ok(result.deployment_id)
    }

    async fn destroy_application(&self, id: &AppId) -> Result<DeploymentId, ClusterError> {
        info!(app = %id, "destroying application");
        let path = app_path(id);
        let resp = self.send(Method::DELETE, &path, None).await?;
        let result: DeploymentResult = decode(&path, resp)?;
        Ok(result.deployment_id)
    }

    async fn kill_tasks_and_scale(&self, tasks: &[TaskId]) -> Result<(), ClusterError> {
        info!(count = tasks.len(), "killing tasks and scaling down");
        let body = serde_json::to_vec(&serde_json::json!({ "ids": tasks }))?;
        let resp = self
            .send(Method::POST, "v2/tasks/delete?scale=true", Some(body.into()))
            .await?;
        if !resp.status.is_success() {
            return Err(ClusterError::Status {
                status: resp.status,
                body: resp.text(),
            });
        }
        Ok(())
    }

    async fn has_deployment(&self, id: &DeploymentId) -> Result<bool, ClusterError> {
        let resp = self.send(Method::GET, "v2/deployments", None).await?;
        let deployments: Vec<Deploy> = decode("v2/deployments", resp)?;
        Ok(deployments.iter().any(|d| &d.id == id))
    }
}

fn authorization(config: &MarathonClientConfig) -> Result<Option<HeaderValue>, ClusterError> {
    let raw = if let Some(token) = &config.token {
        format!("token={token}")
    } else if let Some(user) = &config.username {
        let password = config.password.as_deref().unwrap_or_default();
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    } else {
        return Ok(None);
    };

    let mut value =
        HeaderValue::from_str(&raw).map_err(|e| ClusterError::InvalidCredentials(e.to_string()))?;
    value.set_sensitive(true);
    Ok(Some(value))
}

fn app_path(id: &AppId) -> String {
    let encoded: Vec<_> = id
        .trimmed()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("v2/apps/{}", encoded.join("/"))
}

fn decode<T: DeserializeOwned>(path: &str, resp: HttpResponse) -> Result<T, ClusterError> {
    if !resp.status.is_success() {
        debug!(path, status = %resp.status, "scheduler returned an error");
        return Err(ClusterError::Status {
            status: resp.status,
            body: resp.text(),
        });
    }
    Ok(serde_json::from_slice(&resp.body)?)
}
