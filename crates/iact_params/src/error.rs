//! Error types for parameter resolution.

use iact_cloud::CloudError;
use thiserror::Error;

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that end the resolution of one test specification.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Every candidate of the first chain node was tried.
    #[error("can not find any available value for {key} in {region} region in {domain} for {test}")]
    Exhausted {
        key: String,
        region: String,
        domain: String,
        test: String,
    },

    /// The search backed out of a dead end and ran out of predecessors.
    #[error("no available value found for {key} in {region} region for {test}")]
    DeadEnd {
        key: String,
        region: String,
        test: String,
    },

    /// The first chain node has an empty domain.
    #[error("no available value found for {key} based on parameter {context} in {region} for {test}")]
    NoCandidates {
        key: String,
        context: String,
        region: String,
        test: String,
    },

    #[error("get constraints timeout for {key} in {region} region for {test}")]
    ConstraintTimeout {
        key: String,
        region: String,
        test: String,
    },

    /// A name-pattern resolver could not produce a value.
    #[error("Parsing pseudo parameter (Key: {key}, Value: {value}) error, {message}")]
    Heuristic {
        key: String,
        value: String,
        message: String,
    },

    #[error("failed to retrieve template: {0}")]
    Template(String),

    #[error("template from {source_url} exceeds maximum allowed size ({max} bytes)")]
    TemplateTooLarge { source_url: String, max: usize },

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolveError {
    /// Error code recorded on the failed specification.
    pub fn code(&self) -> String {
        match self {
            ResolveError::Exhausted { .. }
            | ResolveError::DeadEnd { .. }
            | ResolveError::NoCandidates { .. } => "ResolutionExhausted".to_string(),
            ResolveError::ConstraintTimeout { .. } => "ConstraintTimeout".to_string(),
            ResolveError::Heuristic { .. } => "PseudoParameterError".to_string(),
            ResolveError::Template(_) | ResolveError::TemplateTooLarge { .. } => {
                "TemplateError".to_string()
            }
            ResolveError::Cloud(e) => e.code().to_string(),
            _ => "ResolutionError".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_key_and_region() {
        let err = ResolveError::NoCandidates {
            key: "ZoneId".into(),
            context: "{}".into(),
            region: "cn-hangzhou".into(),
            test: "default".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ZoneId"));
        assert!(msg.contains("cn-hangzhou"));
        assert_eq!(err.code(), "ResolutionExhausted");

        let err = ResolveError::Heuristic {
            key: "VpcId".into(),
            value: "$[iact3-auto]".into(),
            message: "can not find any vswitch in zone None".into(),
        };
        assert_eq!(
            err.to_string(),
            "Parsing pseudo parameter (Key: VpcId, Value: $[iact3-auto]) error, can not find any vswitch in zone None"
        );
    }

    #[test]
    fn test_cloud_code_passes_through() {
        let err: ResolveError = CloudError::service("Throttling", "slow down").into();
        assert_eq!(err.code(), "Throttling");
    }
}
