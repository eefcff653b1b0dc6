// ABOUTME: Validated deployment group name shared by blue and green incarnations.
// ABOUTME: Must be usable inside an HAProxy backend name ("{group}_{port}").

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentGroupError {
    #[error("deployment group cannot be empty")]
    Empty,

    #[error("deployment group exceeds maximum length of 128 characters")]
    TooLong,

    #[error("invalid character in deployment group: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentGroup(String);

impl DeploymentGroup {
    pub fn new(value: &str) -> Result<Self, DeploymentGroupError> {
        if value.is_empty() {
            return Err(DeploymentGroupError::Empty);
        }

        if value.len() > 128 {
            return Err(DeploymentGroupError::TooLong);
        }

        // HAProxy proxy names accept alphanumerics plus - _ . :
        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' && c != ':' {
                return Err(DeploymentGroupError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The HAProxy backend (pxname) serving this group on `port`.
    pub fn backend_name(&self, port: u16) -> String {
        format!("{}_{}", self.0, port)
    }
}

impl fmt::Display for DeploymentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
