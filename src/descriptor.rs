// ABOUTME: Loads Marathon application descriptors from JSON or YAML files.
// ABOUTME: Substitutes ${NAME} tokens from explicit params, then the environment.

use crate::marathon::Application;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("token pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported descriptor format for {0}, expected .json, .yml or .yaml")]
    UnsupportedFormat(PathBuf),

    #[error("one or more ${{PARAMS}} could not be resolved: {}", .0.join(", "))]
    ParamsMissing(Vec<String>),

    #[error("invalid JSON application descriptor: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML application descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid param '{0}', expected KEY=VALUE")]
    InvalidParam(String),
}

/// Descriptor encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yml" | "yaml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

pub struct DescriptorOptions<'a> {
    /// Fail on tokens that neither `params` nor the environment resolve.
    /// Otherwise they are left in place.
    pub error_on_missing_params: bool,
    pub params: &'a HashMap<String, String>,
}

/// Replace every `${NAME}` in `input`.
///
/// Returns the substituted text and the names that could not be resolved,
/// in order of first appearance.
pub fn substitute(input: &str, params: &HashMap<String, String>) -> (String, Vec<String>) {
    let mut missing: Vec<String> = Vec::new();

    let output = TOKEN.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        if let Some(value) = params.get(name) {
            return value.clone();
        }
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if !missing.iter().any(|m| m == name) {
                    tracing::warn!(param = name, "cannot find a value for descriptor param");
                    missing.push(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    (output.into_owned(), missing)
}

/// Parse an application descriptor already read into memory.
pub fn parse_application(
    content: &str,
    format: Format,
    opts: &DescriptorOptions<'_>,
) -> Result<Application, DescriptorError> {
    let (content, missing) = substitute(content, opts.params);
    if opts.error_on_missing_params && !missing.is_empty() {
        return Err(DescriptorError::ParamsMissing(missing));
    }

    let app = match format {
        Format::Json => serde_json::from_str(&content)?,
        Format::Yaml => serde_yaml::from_str(&content)?,
    };
    Ok(app)
}

/// Read and parse the application descriptor at `path`.
pub fn load_application(
    path: &Path,
    opts: &DescriptorOptions<'_>,
) -> Result<Application, DescriptorError> {
    let format =
        Format::from_path(path).ok_or_else(|| DescriptorError::UnsupportedFormat(path.into()))?;
    let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.into(),
        source,
    })?;
    tracing::debug!(path = %path.display(), ?format, "loading application descriptor");
    parse_application(&content, format, opts)
}

/// Split a `KEY=VALUE` argument. The value may itself contain `=`.
pub fn parse_param(arg: &str) -> Result<(String, String), DescriptorError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(DescriptorError::InvalidParam(arg.to_string())),
    }
}

/// Read a params file: one `KEY=VALUE` per line, `#` starts a comment line.
pub fn load_params_file(path: &Path) -> Result<HashMap<String, String>, DescriptorError> {
    let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.into(),
        source,
    })?;

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_param)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("app.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("app.YAML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("app.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("app.toml")), None);
        assert_eq!(Format::from_path(Path::new("app")), None);
    }

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("OPTS=a=b").unwrap(),
            ("OPTS".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn dollar_without_braces_is_untouched() {
        let (out, missing) = substitute("cost: $5", &HashMap::new());
        assert_eq!(out, "cost: $5");
        assert!(missing.is_empty());
    }
}
