//! A complete test run: create, watch, clean up, report.

use std::future::Future;

use tracing::{error, info, warn};

use crate::error::{StackError, StackResult};
use crate::progress::ProgressReporter;
use crate::stacker::{StackFilter, Stacker};
use crate::status::SUCCEEDED_STATUSES;

/// What happens to stacks once they have settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Leave every stack in place.
    pub no_delete: bool,
    /// Only delete stacks that launched successfully.
    pub keep_failed: bool,
    /// Wait for deletions to finish before returning.
    pub wait_for_delete: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            no_delete: false,
            keep_failed: false,
            wait_for_delete: true,
        }
    }
}

pub struct TestRun {
    stacker: Stacker,
    policy: CleanupPolicy,
    reporter: ProgressReporter,
}

impl TestRun {
    pub fn new(stacker: Stacker, policy: CleanupPolicy) -> Self {
        Self {
            stacker,
            policy,
            reporter: ProgressReporter::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn stacker(&self) -> &Stacker {
        &self.stacker
    }

    /// Run until done or until Ctrl-C.
    pub async fn run(&self) -> StackResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for interrupts: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until done or until `shutdown` resolves.
    ///
    /// On shutdown, in-flight work is dropped and every stack accepted so far
    /// is deleted before [`StackError::Interrupted`] is returned.
    pub async fn run_until<F>(&self, shutdown: F) -> StackResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute() => result,
            _ = shutdown => {
                warn!("Interrupted, deleting launched stacks");
                if let Err(e) = self.stacker.delete_launched().await {
                    error!("Cleanup after interrupt failed: {}", e);
                }
                Err(StackError::Interrupted)
            }
        }
    }

    async fn execute(&self) -> StackResult<()> {
        self.stacker.create_all().await?;
        self.reporter.watch(&self.stacker).await;
        self.cleanup().await;

        match self.stacker.failure_error() {
            Some(err) => Err(err),
            None => {
                info!(count = self.stacker.stacks().len(), "All stacks passed");
                Ok(())
            }
        }
    }

    /// Delete stacks according to the policy.
    ///
    /// A stack that cannot be deleted is left `DELETE_FAILED` and is reported
    /// by the end-of-run check; the other deletions still proceed.
    pub async fn cleanup(&self) {
        if self.policy.no_delete {
            info!("Leaving stacks in place");
            return;
        }

        let filter = self
            .policy
            .keep_failed
            .then(|| StackFilter::statuses(SUCCEEDED_STATUSES));
        if let Err(e) = self.stacker.delete_all(filter.as_ref()).await {
            warn!("Cleanup left stacks behind: {}", e);
        }

        if self.policy.wait_for_delete {
            self.reporter.watch(&self.stacker).await;
        }
    }
}
