// ABOUTME: Configuration types and parsing for bluegreen.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and CLI-facing defaults.

mod env_value;
mod init;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;

use crate::bluegreen::BlueGreenOptions;
use crate::error::{Error, Result};
use crate::marathon::MarathonClientConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "bluegreen.yml";
pub const CONFIG_FILENAME_ALT: &str = "bluegreen.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".bluegreen/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub marathon: MarathonConfig,

    #[serde(default)]
    pub bluegreen: BlueGreenSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarathonConfig {
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<EnvValue>,

    #[serde(default)]
    pub token: Option<EnvValue>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default, with = "humantime_serde")]
    pub wait_timeout: Option<Duration>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// The `bluegreen` section: rollout options plus descriptor params.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlueGreenSection {
    #[serde(flatten)]
    pub options: BlueGreenOptions,

    #[serde(default)]
    pub params: HashMap<String, EnvValue>,
}

impl MarathonConfig {
    /// Resolve secrets and build the scheduler client settings.
    pub fn client_config(&self) -> Result<MarathonClientConfig> {
        Ok(MarathonClientConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.as_ref().map(EnvValue::resolve).transpose()?,
            token: self.token.as_ref().map(EnvValue::resolve).transpose()?,
            request_timeout: self.request_timeout,
            wait_timeout: self.wait_timeout,
        })
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Rollout options with descriptor params resolved from the environment.
    pub fn blue_green_options(&self) -> Result<BlueGreenOptions> {
        let mut options = self.bluegreen.options.clone();
        options.env_params = resolve_env_map(&self.bluegreen.params)?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.marathon.url.trim().is_empty() {
            return Err(Error::InvalidConfig("marathon.url cannot be empty".into()));
        }
        if self.bluegreen.options.load_balancer_url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "bluegreen.load_balancer cannot be empty".into(),
            ));
        }
        if self.bluegreen.options.initial_instances == 0 {
            return Err(Error::InvalidConfig(
                "bluegreen.initial_instances must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
