//! Classification of raw stack statuses into coarse buckets.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const COMPLETE_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE", "DELETE_COMPLETE"];

pub const IN_PROGRESS_STATUSES: &[&str] = &[
    "CREATE_IN_PROGRESS",
    "UPDATE_IN_PROGRESS",
    "DELETE_IN_PROGRESS",
    "CREATE_ROLLBACK_IN_PROGRESS",
    "ROLLBACK_IN_PROGRESS",
];

/// Rollbacks count as failures even when the rollback itself completed.
pub const FAILED_STATUSES: &[&str] = &[
    "CREATE_FAILED",
    "UPDATE_FAILED",
    "DELETE_FAILED",
    "CREATE_ROLLBACK_FAILED",
    "CREATE_ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
    "ROLLBACK_COMPLETE",
];

/// Statuses a stack may be in and still be kept by `keep_failed` cleanup.
pub const SUCCEEDED_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE"];

/// Coarse stack state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusBucket {
    Complete,
    InProgress,
    Failed,
    Unknown,
}

impl StatusBucket {
    /// Bucket of a raw status string. Unlisted statuses are `Unknown`.
    pub fn classify(status: &str) -> Self {
        if COMPLETE_STATUSES.contains(&status) {
            StatusBucket::Complete
        } else if IN_PROGRESS_STATUSES.contains(&status) {
            StatusBucket::InProgress
        } else if FAILED_STATUSES.contains(&status) {
            StatusBucket::Failed
        } else {
            StatusBucket::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusBucket::Complete => "COMPLETE",
            StatusBucket::InProgress => "IN_PROGRESS",
            StatusBucket::Failed => "FAILED",
            StatusBucket::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value of the launch-succeeded flag after observing `status`.
///
/// Failures clear it, completions other than deletion set it, anything else
/// leaves it unchanged.
pub fn launch_outcome(status: &str, current: bool) -> bool {
    match StatusBucket::classify(status) {
        StatusBucket::Failed => false,
        StatusBucket::Complete if status != "DELETE_COMPLETE" => true,
        _ => current,
    }
}
