// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates bluegreen.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const DEFAULT_MARATHON: &str = "http://localhost:8080";
const DEFAULT_LOAD_BALANCER: &str = "http://localhost:9090";

pub fn init_config(
    dir: &Path,
    marathon: Option<&str>,
    load_balancer: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    for url in [marathon, load_balancer].into_iter().flatten() {
        if !url.starts_with("http://") {
            return Err(Error::InvalidConfig(format!(
                "'{url}' must be an http:// url"
            )));
        }
    }

    let yaml = generate_template_yaml(
        marathon.unwrap_or(DEFAULT_MARATHON),
        load_balancer.unwrap_or(DEFAULT_LOAD_BALANCER),
    );
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(marathon: &str, load_balancer: &str) -> String {
    format!(
        r#"marathon:
  url: {marathon}
  # username: deploy
  # password: {{ env: MARATHON_PASSWORD }}
  # token: {{ env: DCOS_TOKEN }}
  request_timeout: 30s

bluegreen:
  load_balancer: {load_balancer}
  proxy_wait_timeout: 300s
  initial_instances: 1
  step_delay: 6s
  resume: true
  error_on_missing_params: true
  # Bound the drain loop; unbounded when omitted
  # drain_deadline: 1h
  # params:
  #   VERSION: {{ env: CI_COMMIT_TAG, default: latest }}
"#
    )
}
