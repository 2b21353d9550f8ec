//! Periodic progress logging until every stack has settled.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::stacker::Stacker;
use crate::status::StatusBucket;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Logs status changes of a run's stacks.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll the status snapshot until no bucket is in progress.
    ///
    /// Read-only: stacks only change through their own refresh.
    pub async fn watch(&self, stacker: &Stacker) {
        let mut seen: HashMap<String, String> = HashMap::new();
        loop {
            for stack in stacker.current() {
                let status = stack.status();
                let bucket = stack.bucket();
                if seen.get(stack.stack_name()) == Some(&status) {
                    continue;
                }

                match bucket {
                    StatusBucket::Failed => {
                        error!(
                            test = %stack.test_name(),
                            region = %stack.region(),
                            stack = %stack.label(),
                            "{}: {}", status, stack.status_reason()
                        );
                        if !stack.is_synthetic() {
                            match stack.error_events(true).await {
                                Ok(events) => {
                                    for event in events {
                                        error!(
                                            resource = %event.logical_id,
                                            resource_type = %event.resource_type,
                                            "{}: {}", event.status, event.status_reason
                                        );
                                    }
                                }
                                Err(e) => warn!(stack = %stack.label(), "Failed to list events: {}", e),
                            }
                        }
                    }
                    _ => info!(
                        test = %stack.test_name(),
                        region = %stack.region(),
                        stack = %stack.label(),
                        "{}", status
                    ),
                }
                seen.insert(stack.stack_name().to_string(), status);
            }

            match stacker.status_snapshot().get(&StatusBucket::InProgress) {
                Some(entry) => debug!(stack = %entry.stack_name, "Waiting for stacks in progress"),
                None => break,
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::{MockCloud, StackScript, TemplateRef};
    use iact_config::TestSpecification;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_watch_returns_once_settled() {
        let cloud = MockCloud::new().add_stack_script(StackScript::new().statuses(&[
            "CREATE_IN_PROGRESS",
            "CREATE_IN_PROGRESS",
            "CREATE_FAILED",
        ]));
        let stacker = Stacker::new(
            "demo",
            vec![TestSpecification::new("ecs", "r1", TemplateRef::from_body("{}"))],
            Arc::new(cloud.clone()),
        );
        stacker.create_all().await.unwrap();

        ProgressReporter::new().watch(&stacker).await;

        let snapshot = stacker.status_snapshot();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![StatusBucket::Failed]);
        assert_eq!(stacker.stacks()[0].status(), "CREATE_FAILED");
        assert!(cloud.was_called("list_stack_events"));
    }
}
