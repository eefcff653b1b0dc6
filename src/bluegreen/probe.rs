// ABOUTME: Finds the live application of a deployment group in the cluster.
// ABOUTME: Decides the next colour and service port, and whether to resume.

use super::BlueGreenError;
use super::labels::{self, DeploymentLabels};
use crate::marathon::{Application, ClusterApi};
use crate::types::Colour;
use tracing::{debug, info};

/// Outcome of scanning the cluster for a deployment group.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// The application currently serving the group, if any.
    pub existing_app: Option<Application>,
    /// Colour for the new application.
    pub colour: Colour,
    /// Service port for the new application.
    pub next_port: u16,
    /// A rollout of this group was already in progress and is continued.
    pub resuming: bool,
}

impl AppState {
    /// Compute the state of `group` from a full application listing.
    ///
    /// Applications count as members when their group label equals `group`
    /// and they carry a colour label. A second member is a conflict unless
    /// `resume` is set, in which case the one started first is the existing
    /// application.
    pub fn from_applications(
        apps: &[Application],
        group: &str,
        alt_port: u16,
        resume: bool,
    ) -> Result<Self, BlueGreenError> {
        let mut existing: Option<(&Application, DeploymentLabels)> = None;
        let mut resuming = false;

        for app in apps {
            if app.labels.is_empty() {
                continue;
            }
            if app.label(labels::DEPLOYMENT_GROUP) != Some(group)
                || app.label(labels::DEPLOYMENT_COLOUR).is_none()
            {
                continue;
            }

            let parsed = DeploymentLabels::from_labels(&app.labels)?;

            if let Some((current, current_labels)) = &existing {
                if !resume {
                    return Err(BlueGreenError::DeploymentInProgress(group.to_string()));
                }
                info!(group, first = %current.id, second = %app.id, "found previous deployment, resuming");
                resuming = true;
                if started_before(current_labels, &parsed) {
                    break;
                }
            }

            debug!(app = %app.id, group, "assigning existing application");
            existing = Some((app, parsed));
        }

        let Some((app, parsed)) = existing else {
            return Ok(Self {
                existing_app: None,
                colour: Colour::Blue,
                next_port: alt_port,
                resuming,
            });
        };

        let next_port = if app.service_port() == Some(alt_port) {
            parsed
                .proxy_port
                .ok_or(BlueGreenError::MissingLabel(labels::PROXY_PORT))?
        } else {
            alt_port
        };
        let colour = parsed.colour.map_or(Colour::Blue, Colour::opposite);

        Ok(Self {
            existing_app: Some(app.clone()),
            colour,
            next_port,
            resuming,
        })
    }
}

/// Scan the cluster for `group` and compute its `AppState`.
pub async fn probe<C: ClusterApi + ?Sized>(
    cluster: &C,
    group: &str,
    alt_port: u16,
    resume: bool,
) -> Result<AppState, BlueGreenError> {
    let apps = cluster.list_applications().await?;
    let state = AppState::from_applications(&apps, group, alt_port, resume)?;

    match &state.existing_app {
        Some(app) => debug!(
            existing = %app.id,
            instances = app.instances,
            next_port = state.next_port,
            colour = %state.colour,
            "probed deployment group"
        ),
        None => debug!(
            next_port = state.next_port,
            colour = %state.colour,
            "no existing deployment for group"
        ),
    }
    Ok(state)
}

fn started_before(a: &DeploymentLabels, b: &DeploymentLabels) -> bool {
    match (a.started_at, b.started_at) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}
