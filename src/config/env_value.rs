// ABOUTME: Config values that are either literal or read from the environment.
// ABOUTME: Used for scheduler credentials and descriptor params kept out of bluegreen.yml.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// `password: s3cret` or `password: { env: MARATHON_PASSWORD, default: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// The value, reading the environment at call time. An unset variable
    /// without a default is `Error::MissingEnvVar`.
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }
}

/// Resolve every value of `map`, failing on the first missing variable.
pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<HashMap<String, String>> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), value.resolve()?)))
        .collect()
}
