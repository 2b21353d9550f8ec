//! Launches one stack per test specification and operates on them as a group.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use iact_cloud::{fan_out, CloudConnector, CreateStackRequest, Tags};
use iact_config::TestSpecification;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{StackError, StackResult};
use crate::naming::{self, TAG_TEST_NAME};
use crate::preview::{self, StackPreview};
use crate::stack::{Stack, StackIdentity, StackReport, REFRESH_INTERVAL};
use crate::status::StatusBucket;

/// Creation timeout handed to the service.
pub const STACK_TIMEOUT_MINUTES: u32 = 60;

/// Most recently observed stack of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub reason: String,
}

pub type StatusSnapshot = BTreeMap<StatusBucket, SnapshotEntry>;

/// Selects stacks by exact status.
#[derive(Debug, Clone, Default)]
pub struct StackFilter {
    statuses: Vec<String>,
}

impl StackFilter {
    pub fn statuses(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn matches(&self, stack: &Stack) -> bool {
        let status = stack.status();
        self.statuses.iter().any(|s| *s == status)
    }
}

/// The stacks of one run.
///
/// The full stack list is written once, when every creation has finished.
/// Stacks accepted by the service are also tracked as they come in, so an
/// interrupted run can still delete them.
pub struct Stacker {
    project_name: String,
    run_id: Uuid,
    tags: Tags,
    connector: Arc<dyn CloudConnector>,
    specs: Vec<TestSpecification>,
    refresh_interval: Duration,
    started: AtomicBool,
    stacks: OnceLock<Vec<Arc<Stack>>>,
    launched: Mutex<Vec<Arc<Stack>>>,
}

impl Stacker {
    pub fn new(
        project_name: impl Into<String>,
        specs: Vec<TestSpecification>,
        connector: Arc<dyn CloudConnector>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            run_id: Uuid::new_v4(),
            tags: Tags::new(),
            connector,
            specs,
            refresh_interval: REFRESH_INTERVAL,
            started: AtomicBool::new(false),
            stacks: OnceLock::new(),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Wrap stacks that already exist, for deletion.
    pub fn from_stacks(connector: Arc<dyn CloudConnector>, stacks: Vec<Arc<Stack>>) -> Self {
        let stacker = Self::new("", Vec::new(), connector);
        stacker.started.store(true, Ordering::SeqCst);
        let _ = stacker.stacks.set(stacks);
        stacker
    }

    /// Extra tags applied to every stack of the run.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn run_id(&self) -> &Uuid {
        &self.run_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Run tags plus the system tags. System tags win on conflict.
    pub fn tags(&self) -> Tags {
        let mut tags = self.tags.clone();
        tags.extend(naming::system_tags(&self.run_id, &self.project_name));
        tags
    }

    /// Every stack of the run, empty until creation has finished.
    pub fn stacks(&self) -> &[Arc<Stack>] {
        self.stacks.get().map_or(&[], Vec::as_slice)
    }

    /// Stacks the service accepted so far.
    pub fn launched(&self) -> Vec<Arc<Stack>> {
        self.launched.lock().clone()
    }

    /// The stack list, or the launched stacks while creation is running.
    pub fn current(&self) -> Vec<Arc<Stack>> {
        match self.stacks.get() {
            Some(stacks) => stacks.clone(),
            None => self.launched(),
        }
    }

    /// Create one stack per specification concurrently.
    ///
    /// Failures never abort siblings: a specification carrying an error, or
    /// one whose creation is rejected, yields a synthetic failed stack.
    pub async fn create_all(&self) -> StackResult<&[Arc<Stack>]> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StackError::AlreadyCreated);
        }

        info!(count = self.specs.len(), run_id = %self.run_id.simple(), "Creating stacks");
        let stacks = fan_out(&self.specs, |spec| self.launch(spec)).await;
        if self.stacks.set(stacks).is_err() {
            return Err(StackError::AlreadyCreated);
        }
        Ok(self.stacks())
    }

    async fn launch(&self, spec: &TestSpecification) -> Arc<Stack> {
        let identity = StackIdentity {
            test_name: spec.test_name.clone(),
            region: spec.region.clone(),
            stack_name: naming::stack_name(&spec.test_name, &spec.region),
            run_id: self.run_id,
        };

        if let Some(err) = &spec.error {
            warn!(test = %spec.test_name, region = %spec.region, "Skipping stack creation: {}", err);
            return Arc::new(Stack::synthetic(
                identity,
                spec.parameters.clone(),
                err.code.clone(),
                err.message.clone(),
                None,
            ));
        }

        let facade = match self.connector.connect(&spec.region, &spec.credential) {
            Ok(facade) => facade,
            Err(e) => {
                error!(test = %spec.test_name, region = %spec.region, "Failed to connect: {}", e);
                return Arc::new(Stack::synthetic(
                    identity,
                    spec.parameters.clone(),
                    e.code(),
                    e.message(),
                    None,
                ));
            }
        };

        let mut tags = spec.tags.clone();
        tags.extend(self.tags());
        tags.insert(TAG_TEST_NAME.to_string(), spec.test_name.clone());

        let request = CreateStackRequest {
            stack_name: identity.stack_name.clone(),
            template: spec.template.clone(),
            parameters: spec.parameters.clone(),
            tags,
            client_token: naming::client_token(&self.run_id, &spec.test_name),
            timeout_in_minutes: STACK_TIMEOUT_MINUTES,
            disable_rollback: true,
            ram_role_name: spec.role_name.clone(),
        };

        info!(
            test = %spec.test_name,
            region = %spec.region,
            stack_name = %request.stack_name,
            "Creating stack"
        );
        let stack_id = match facade.create_stack(&request).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    test = %spec.test_name,
                    region = %spec.region,
                    "Stack creation rejected: {}", e
                );
                return Arc::new(Stack::synthetic(
                    identity,
                    spec.parameters.clone(),
                    e.code(),
                    e.message(),
                    Some(facade),
                ));
            }
        };

        let stack = Arc::new(
            Stack::launched(identity, stack_id, spec.parameters.clone(), facade)
                .with_refresh_interval(self.refresh_interval),
        );
        self.launched.lock().push(Arc::clone(&stack));

        match stack.refresh().await {
            Ok(StatusBucket::InProgress) => stack.start_refresh(),
            Ok(_) => {}
            Err(e) => {
                warn!(stack = %stack.stack_name(), "First refresh failed: {}", e);
                stack.start_refresh();
            }
        }
        stack
    }

    /// Preview every specification concurrently. Nothing is created and the
    /// stack list is left untouched.
    pub async fn preview_all(&self) -> Vec<StackPreview> {
        info!(count = self.specs.len(), "Previewing stacks");
        fan_out(&self.specs, |spec| preview::preview_stack(self.connector.as_ref(), spec)).await
    }

    /// For each bucket, the stack observed most recently.
    pub fn status_snapshot(&self) -> StatusSnapshot {
        let mut latest: BTreeMap<StatusBucket, (DateTime<Utc>, SnapshotEntry)> = BTreeMap::new();
        for stack in self.current() {
            let report = stack.report();
            if matches!(latest.get(&report.bucket), Some((seen, _)) if *seen > report.observed_at) {
                continue;
            }
            latest.insert(
                report.bucket,
                (
                    report.observed_at,
                    SnapshotEntry {
                        stack_id: report.stack_id,
                        stack_name: report.stack_name,
                        reason: report.status_reason,
                    },
                ),
            );
        }
        latest.into_iter().map(|(bucket, (_, entry))| (bucket, entry)).collect()
    }

    pub fn reports(&self) -> Vec<StackReport> {
        self.current().iter().map(|s| s.report()).collect()
    }

    pub fn failed_stacks(&self) -> Vec<Arc<Stack>> {
        self.current()
            .into_iter()
            .filter(|s| s.bucket() == StatusBucket::Failed)
            .collect()
    }

    /// Aggregate error naming every failed stack, if any.
    pub fn failure_error(&self) -> Option<StackError> {
        let failed = self.failed_stacks();
        if failed.is_empty() {
            return None;
        }
        let details = failed
            .iter()
            .map(|s| format!("{}: {}", s.label(), s.status_reason()))
            .collect::<Vec<_>>()
            .join(", ");
        Some(StackError::FailedStacks {
            count: failed.len(),
            details: format!("{{{}}}", details),
        })
    }

    /// Delete every stack, or only those matching `filter`, concurrently.
    ///
    /// Every deletion is attempted; the first error is returned afterwards.
    pub async fn delete_all(&self, filter: Option<&StackFilter>) -> StackResult<()> {
        let targets: Vec<Arc<Stack>> = self
            .current()
            .into_iter()
            .filter(|s| filter.map_or(true, |f| f.matches(s)))
            .collect();
        Self::delete_stacks(targets).await
    }

    /// Delete the stacks accepted so far, for interrupted runs.
    pub async fn delete_launched(&self) -> StackResult<()> {
        Self::delete_stacks(self.launched()).await
    }

    async fn delete_stacks(targets: Vec<Arc<Stack>>) -> StackResult<()> {
        let results = fan_out(targets, |stack| async move { stack.delete().await }).await;

        let mut first = None;
        for result in results {
            if let Err(e) = result {
                error!("{}", e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
