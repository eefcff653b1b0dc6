// ABOUTME: Typed view of the blue/green labels carried on Marathon applications.
// ABOUTME: Converted to and from the raw label map only at the API boundary.

use crate::types::{AppId, Colour};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::collections::HashMap;
use thiserror::Error;

pub const DEPLOYMENT_GROUP: &str = "HAPROXY_DEPLOYMENT_GROUP";
pub const DEPLOYMENT_ALT_PORT: &str = "HAPROXY_DEPLOYMENT_ALT_PORT";
pub const DEPLOYMENT_COLOUR: &str = "HAPROXY_DEPLOYMENT_COLOUR";
pub const PROXY_PORT: &str = "HAPROXY_0_PORT";
pub const TARGET_INSTANCES: &str = "HAPROXY_DEPLOYMENT_TARGET_INSTANCES";
pub const STARTED_AT: &str = "HAPROXY_DEPLOYMENT_STARTED_AT";
pub const APP_ID: &str = "HAPROXY_APP_ID";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("label {label} has invalid value '{value}': {reason}")]
pub struct LabelError {
    pub label: &'static str,
    pub value: String,
    pub reason: String,
}

/// Blue/green metadata of one application. Absent labels are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentLabels {
    pub group: Option<String>,
    pub alt_port: Option<u16>,
    pub colour: Option<Colour>,
    /// Stable frontend port; the backend is named `{group}_{proxy_port}`.
    pub proxy_port: Option<u16>,
    /// Instance count the rollout converges to.
    pub target_instances: Option<u32>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub app_id: Option<AppId>,
}

impl DeploymentLabels {
    /// Parse the blue/green labels out of `labels`. A present numeric or
    /// timestamp label that does not parse is an error. The colour is read
    /// leniently, see `Colour::from_label`.
    pub fn from_labels(labels: &HashMap<String, String>) -> Result<Self, LabelError> {
        Ok(Self {
            group: labels.get(DEPLOYMENT_GROUP).cloned(),
            alt_port: parse(labels, DEPLOYMENT_ALT_PORT, |v| v.parse::<u16>())?,
            colour: labels.get(DEPLOYMENT_COLOUR).map(|v| Colour::from_label(v)),
            proxy_port: parse(labels, PROXY_PORT, |v| v.parse::<u16>())?,
            target_instances: parse(labels, TARGET_INSTANCES, |v| v.parse::<u32>())?,
            started_at: parse(labels, STARTED_AT, DateTime::<FixedOffset>::parse_from_rfc3339)?,
            app_id: labels.get(APP_ID).map(|v| AppId::new(v.as_str())),
        })
    }

    /// Write every present field into `labels`, leaving other keys alone.
    pub fn apply_to(&self, labels: &mut HashMap<String, String>) {
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                labels.insert(key.to_string(), value);
            }
        };

        set(DEPLOYMENT_GROUP, self.group.clone());
        set(DEPLOYMENT_ALT_PORT, self.alt_port.map(|p| p.to_string()));
        set(DEPLOYMENT_COLOUR, self.colour.map(|c| c.to_string()));
        set(PROXY_PORT, self.proxy_port.map(|p| p.to_string()));
        set(
            TARGET_INSTANCES,
            self.target_instances.map(|n| n.to_string()),
        );
        set(
            STARTED_AT,
            self.started_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        set(APP_ID, self.app_id.as_ref().map(|id| id.to_string()));
    }

    /// Name of the load-balancer backend serving this group.
    pub fn backend_name(&self) -> Option<String> {
        match (&self.group, self.proxy_port) {
            (Some(group), Some(port)) => Some(format!("{group}_{port}")),
            _ => None,
        }
    }
}

fn parse<T, E: std::fmt::Display>(
    labels: &HashMap<String, String>,
    label: &'static str,
    parser: impl Fn(&str) -> Result<T, E>,
) -> Result<Option<T>, LabelError> {
    labels
        .get(label)
        .map(|value| {
            parser(value.trim()).map_err(|e| LabelError {
                label,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_label_set() {
        let parsed = DeploymentLabels::from_labels(&labels(&[
            (DEPLOYMENT_GROUP, "web"),
            (DEPLOYMENT_ALT_PORT, "10001"),
            (DEPLOYMENT_COLOUR, "green"),
            (PROXY_PORT, "10000"),
            (TARGET_INSTANCES, "3"),
            (STARTED_AT, "2024-05-01T10:00:00Z"),
            (APP_ID, "/web"),
        ]))
        .unwrap();

        assert_eq!(parsed.group.as_deref(), Some("web"));
        assert_eq!(parsed.alt_port, Some(10001));
        assert_eq!(parsed.colour, Some(Colour::Green));
        assert_eq!(parsed.target_instances, Some(3));
        assert_eq!(parsed.backend_name().as_deref(), Some("web_10000"));
        assert_eq!(parsed.app_id, Some(AppId::new("/web")));
    }

    #[test]
    fn missing_labels_are_none() {
        let parsed = DeploymentLabels::from_labels(&labels(&[("OTHER", "x")])).unwrap();
        assert_eq!(parsed, DeploymentLabels::default());
        assert_eq!(parsed.backend_name(), None);
    }

    #[test]
    fn malformed_port_is_an_error() {
        let err = DeploymentLabels::from_labels(&labels(&[(DEPLOYMENT_ALT_PORT, "ten")]))
            .unwrap_err();
        assert_eq!(err.label, DEPLOYMENT_ALT_PORT);
        assert_eq!(err.value, "ten");
    }

    #[test]
    fn unknown_colour_reads_as_green() {
        let parsed = DeploymentLabels::from_labels(&labels(&[(DEPLOYMENT_COLOUR, "red")])).unwrap();
        assert_eq!(parsed.colour, Some(Colour::Green));
    }

    #[test]
    fn apply_writes_only_present_fields() {
        let mut map = labels(&[("KEEP", "me"), (DEPLOYMENT_GROUP, "web")]);
        let typed = DeploymentLabels {
            colour: Some(Colour::Blue),
            target_instances: Some(2),
            started_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00+00:00").ok(),
            ..Default::default()
        };
        typed.apply_to(&mut map);

        assert_eq!(map["KEEP"], "me");
        assert_eq!(map[DEPLOYMENT_GROUP], "web");
        assert_eq!(map[DEPLOYMENT_COLOUR], "blue");
        assert_eq!(map[TARGET_INSTANCES], "2");
        assert_eq!(map[STARTED_AT], "2024-05-01T10:00:00Z");
        assert!(!map.contains_key(PROXY_PORT));
    }
}
