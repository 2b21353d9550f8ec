//! Error types for cloud facade operations.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors reported by the cloud service facade.
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote API rejected a call.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Stack not found: {0}")]
    NotFound(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid fixture: {0}")]
    Fixture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Build a provider error from a code and message.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Provider error code, or a synthetic code for local failures.
    pub fn code(&self) -> &str {
        match self {
            CloudError::Service { code, .. } => code,
            CloudError::NotFound(_) => "StackNotFound",
            CloudError::Credential(_) => "InvalidCredential",
            CloudError::Fixture(_) => "InvalidFixture",
            CloudError::Io(_) | CloudError::Yaml(_) | CloudError::Json(_) => "ClientError",
        }
    }

    /// Human readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            CloudError::Service { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
            || matches!(self, CloudError::Service { code, .. } if code == "StackNotFound")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_code_and_message() {
        let err = CloudError::service("InvalidParameter", "ZoneId is invalid");
        assert_eq!(err.code(), "InvalidParameter");
        assert_eq!(err.message(), "ZoneId is invalid");
        assert_eq!(err.to_string(), "InvalidParameter: ZoneId is invalid");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(CloudError::NotFound("stack-1".into()).is_not_found());
        assert!(CloudError::service("StackNotFound", "gone").is_not_found());
        assert!(!CloudError::service("Throttling", "slow down").is_not_found());
    }
}
