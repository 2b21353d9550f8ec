//! Error types for configuration loading.

use std::path::PathBuf;

use iact_cloud::CloudError;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config in {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Could not find template in {0}, template files need to end with .template.json, .template.yaml or .template.yml")]
    TemplateNotFound(PathBuf),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("No test matches filter: {0}")]
    NoMatchingTests(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
