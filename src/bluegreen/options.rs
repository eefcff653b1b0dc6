// ABOUTME: Per-invocation settings for a blue/green rollout.
// ABOUTME: Deserialized from the bluegreen config section and overridden by CLI flags.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlueGreenOptions {
    /// Marathon-LB stats endpoint, e.g. `http://host:9090`.
    #[serde(rename = "load_balancer")]
    pub load_balancer_url: String,

    /// How long a load-balancer reload may hold back a drain step.
    #[serde(with = "humantime_serde")]
    pub proxy_wait_timeout: Duration,

    /// Instances the new application starts with when replacing an old one.
    pub initial_instances: u32,

    /// Delay between successive drain steps.
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,

    /// Continue a rollout found in progress instead of refusing it.
    pub resume: bool,

    /// Compute and print the new application without touching the cluster.
    #[serde(skip)]
    pub dry_run: bool,

    /// Fail descriptor loading on unresolved `${NAME}` tokens.
    pub error_on_missing_params: bool,

    /// Values for descriptor `${NAME}` tokens, consulted before the environment.
    #[serde(skip)]
    pub env_params: HashMap<String, String>,

    /// Upper bound for the drain loop. Unbounded when absent.
    #[serde(with = "humantime_serde")]
    pub drain_deadline: Option<Duration>,
}

impl Default for BlueGreenOptions {
    fn default() -> Self {
        Self {
            load_balancer_url: "http://localhost:9090".to_string(),
            proxy_wait_timeout: Duration::from_secs(300),
            initial_instances: 1,
            step_delay: Duration::from_secs(6),
            resume: true,
            dry_run: false,
            error_on_missing_params: true,
            env_params: HashMap::new(),
            drain_deadline: None,
        }
    }
}
