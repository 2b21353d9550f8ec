//! Error types for stack orchestration.

use iact_cloud::CloudError;
use thiserror::Error;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors raised while launching, watching or deleting stacks.
#[derive(Error, Debug)]
pub enum StackError {
    /// Stacks remained failed once cleanup finished.
    #[error("One or more stacks failed to create: {details}")]
    FailedStacks { count: usize, details: String },

    #[error("Stacks were already created for this run")]
    AlreadyCreated,

    #[error("Failed to delete stack {stack_id} in {region}: {source}")]
    Delete {
        stack_id: String,
        region: String,
        source: CloudError,
    },

    #[error("Run interrupted, launched stacks were cleaned up")]
    Interrupted,

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_stacks_message() {
        let err = StackError::FailedStacks {
            count: 1,
            details: "{stack-1: quota exceeded}".into(),
        };
        assert_eq!(
            err.to_string(),
            "One or more stacks failed to create: {stack-1: quota exceeded}"
        );
    }

    #[test]
    fn test_delete_error_keeps_cloud_source() {
        let err = StackError::Delete {
            stack_id: "stack-1".into(),
            region: "cn-hangzhou".into(),
            source: CloudError::service("Forbidden", "no permission"),
        };
        assert!(err.to_string().contains("stack-1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
