//! One launched (or synthetic) stack and its background status refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use iact_cloud::{
    fetch_all, CloudFacade, Parameters, StackEvent, StackResource, StackSummary,
    DEFAULT_PAGE_SIZE,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StackError, StackResult};
use crate::naming::{TAG_RUN_ID, TAG_TEST_NAME};
use crate::status::{launch_outcome, StatusBucket, FAILED_STATUSES};

/// Period of the background status refresh.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Events and resources older than this are fetched again.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

/// Who a stack belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackIdentity {
    pub test_name: String,
    pub region: String,
    pub stack_name: String,
    pub run_id: Uuid,
}

/// Serializable view of a stack, used for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackReport {
    pub test_name: String,
    pub region: String,
    pub stack_name: String,
    pub stack_id: Option<String>,
    pub status: String,
    pub status_reason: String,
    pub bucket: StatusBucket,
    pub launch_succeeded: bool,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Cached<T> {
    items: Vec<T>,
    fetched_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items,
            fetched_at: Instant::now(),
        }
    }

    fn fresh(&self) -> Option<Vec<T>> {
        (!self.items.is_empty() && self.fetched_at.elapsed() < CACHE_TTL).then(|| self.items.clone())
    }
}

#[derive(Debug)]
struct StackState {
    status: String,
    status_reason: String,
    launch_succeeded: bool,
    observed_at: DateTime<Utc>,
    delete_requested: bool,
    events: Option<Cached<StackEvent>>,
    resources: Option<Cached<StackResource>>,
}

impl StackState {
    fn new(status: impl Into<String>, status_reason: impl Into<String>) -> Self {
        let status = status.into();
        Self {
            launch_succeeded: launch_outcome(&status, false),
            status,
            status_reason: status_reason.into(),
            observed_at: Utc::now(),
            delete_requested: false,
            events: None,
            resources: None,
        }
    }

    fn observe(&mut self, status: String, status_reason: String) {
        self.launch_succeeded = launch_outcome(&status, self.launch_succeeded);
        self.status = status;
        self.status_reason = status_reason;
        self.observed_at = Utc::now();
    }
}

/// A stack launched for one test in one region.
///
/// Synthetic stacks stand in for tests whose configuration was invalid or
/// whose creation call was rejected. They have no identifier, are always
/// classified as failed, and never touch the cloud.
pub struct Stack {
    identity: StackIdentity,
    stack_id: Option<String>,
    parameters: Parameters,
    synthetic: bool,
    facade: Option<Arc<dyn CloudFacade>>,
    refresh_interval: Duration,
    state: RwLock<StackState>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl Stack {
    /// A stack the service accepted.
    pub fn launched(
        identity: StackIdentity,
        stack_id: impl Into<String>,
        parameters: Parameters,
        facade: Arc<dyn CloudFacade>,
    ) -> Self {
        Self {
            identity,
            stack_id: Some(stack_id.into()),
            parameters,
            synthetic: false,
            facade: Some(facade),
            refresh_interval: REFRESH_INTERVAL,
            state: RwLock::new(StackState::new("CREATE_IN_PROGRESS", "")),
            refresher: Mutex::new(None),
        }
    }

    /// A stack that was never created. Its status is the error code.
    pub fn synthetic(
        identity: StackIdentity,
        parameters: Parameters,
        code: impl Into<String>,
        message: impl Into<String>,
        facade: Option<Arc<dyn CloudFacade>>,
    ) -> Self {
        Self {
            identity,
            stack_id: None,
            parameters,
            synthetic: true,
            facade,
            refresh_interval: REFRESH_INTERVAL,
            state: RwLock::new(StackState::new(code, message)),
            refresher: Mutex::new(None),
        }
    }

    /// Rebuild a stack from a tag listing entry.
    pub fn from_summary(summary: StackSummary, facade: Arc<dyn CloudFacade>) -> Self {
        let identity = StackIdentity {
            test_name: summary.tags.get(TAG_TEST_NAME).cloned().unwrap_or_default(),
            region: summary.region,
            stack_name: summary.stack_name,
            run_id: summary
                .tags
                .get(TAG_RUN_ID)
                .and_then(|id| Uuid::parse_str(id).ok())
                .unwrap_or_else(Uuid::nil),
        };
        Self {
            identity,
            stack_id: Some(summary.stack_id),
            parameters: Parameters::new(),
            synthetic: false,
            facade: Some(facade),
            refresh_interval: REFRESH_INTERVAL,
            state: RwLock::new(StackState::new(summary.status, "")),
            refresher: Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn identity(&self) -> &StackIdentity {
        &self.identity
    }

    pub fn test_name(&self) -> &str {
        &self.identity.test_name
    }

    pub fn region(&self) -> &str {
        &self.identity.region
    }

    pub fn stack_name(&self) -> &str {
        &self.identity.stack_name
    }

    pub fn stack_id(&self) -> Option<&str> {
        self.stack_id.as_deref()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn status(&self) -> String {
        self.state.read().status.clone()
    }

    pub fn status_reason(&self) -> String {
        self.state.read().status_reason.clone()
    }

    pub fn launch_succeeded(&self) -> bool {
        self.state.read().launch_succeeded
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.state.read().observed_at
    }

    pub fn bucket(&self) -> StatusBucket {
        if self.synthetic {
            return StatusBucket::Failed;
        }
        StatusBucket::classify(&self.state.read().status)
    }

    /// Identifier used in reports: the stack id, or the name for synthetic stacks.
    pub fn label(&self) -> &str {
        self.stack_id().unwrap_or(&self.identity.stack_name)
    }

    pub fn report(&self) -> StackReport {
        let state = self.state.read();
        StackReport {
            test_name: self.identity.test_name.clone(),
            region: self.identity.region.clone(),
            stack_name: self.identity.stack_name.clone(),
            stack_id: self.stack_id.clone(),
            status: state.status.clone(),
            status_reason: state.status_reason.clone(),
            bucket: if self.synthetic {
                StatusBucket::Failed
            } else {
                StatusBucket::classify(&state.status)
            },
            launch_succeeded: state.launch_succeeded,
            observed_at: state.observed_at,
        }
    }

    fn remote(&self) -> Option<(&str, &Arc<dyn CloudFacade>)> {
        match (&self.stack_id, &self.facade) {
            (Some(id), Some(facade)) => Some((id.as_str(), facade)),
            _ => None,
        }
    }

    /// Describe the stack once and record what was observed.
    ///
    /// Stops the background refresh once the stack leaves the in-progress bucket.
    pub async fn refresh(&self) -> StackResult<StatusBucket> {
        let Some((stack_id, facade)) = self.remote() else {
            return Ok(self.bucket());
        };

        let description = facade.describe_stack(stack_id).await?;
        let bucket = {
            let mut state = self.state.write();
            match description {
                Some(d) => state.observe(d.status, d.status_reason.unwrap_or_default()),
                None if state.delete_requested => {
                    state.observe("DELETE_COMPLETE".to_string(), String::new())
                }
                None => state.observe(String::new(), "stack not found".to_string()),
            }
            StatusBucket::classify(&state.status)
        };

        debug!(stack_id = %stack_id, status = %self.status(), "Refreshed stack");
        if bucket != StatusBucket::InProgress {
            self.cancel_refresh();
        }
        Ok(bucket)
    }

    /// Start (or restart) the periodic refresh.
    ///
    /// The task holds only a weak reference, so dropping the last handle to
    /// the stack ends it.
    pub fn start_refresh(self: &Arc<Self>) {
        if self.remote().is_none() {
            return;
        }

        let weak = Arc::downgrade(self);
        let period = self.refresh_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let Some(stack) = weak.upgrade() else {
                    break;
                };
                match stack.refresh().await {
                    Ok(StatusBucket::InProgress) => {}
                    Ok(_) => break,
                    Err(e) => warn!(stack = %stack.stack_name(), "Failed to refresh stack: {}", e),
                }
            }
        });

        if let Some(previous) = self.refresher.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel_refresh(&self) {
        if let Some(handle) = self.refresher.lock().take() {
            handle.abort();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Request deletion. Stacks without an identifier are left alone, and a
    /// stack the service no longer knows counts as deleted. A rejected
    /// request leaves the stack in `DELETE_FAILED`.
    pub async fn delete(self: &Arc<Self>) -> StackResult<()> {
        let Some((stack_id, facade)) = self.remote() else {
            debug!(stack = %self.stack_name(), "Stack was never created, nothing to delete");
            return Ok(());
        };

        info!(stack_id = %stack_id, region = %self.region(), "Deleting stack");
        match facade.delete_stack(stack_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(stack_id = %stack_id, "Stack already gone");
            }
            Err(source) => {
                self.cancel_refresh();
                self.state
                    .write()
                    .observe("DELETE_FAILED".to_string(), source.message());
                return Err(StackError::Delete {
                    stack_id: stack_id.to_string(),
                    region: self.region().to_string(),
                    source,
                })
            }
        }
        self.state.write().delete_requested = true;

        match self.refresh().await {
            Ok(StatusBucket::InProgress) => self.start_refresh(),
            Ok(_) => {}
            Err(e) => {
                warn!(stack_id = %stack_id, "Failed to refresh deleted stack: {}", e);
                self.start_refresh();
            }
        }
        Ok(())
    }

    /// Stack events, served from cache unless forced, empty or stale.
    pub async fn events(&self, force: bool) -> StackResult<Vec<StackEvent>> {
        let Some((stack_id, facade)) = self.remote() else {
            return Ok(Vec::new());
        };
        if !force {
            if let Some(events) = self.state.read().events.as_ref().and_then(Cached::fresh) {
                return Ok(events);
            }
        }

        let events = fetch_all(DEFAULT_PAGE_SIZE, |page| {
            facade.list_stack_events(stack_id, page)
        })
        .await?;
        self.state.write().events = Some(Cached::new(events.clone()));
        Ok(events)
    }

    /// Stack resources, cached like [`Stack::events`].
    pub async fn resources(&self, force: bool) -> StackResult<Vec<StackResource>> {
        let Some((stack_id, facade)) = self.remote() else {
            return Ok(Vec::new());
        };
        if !force {
            if let Some(resources) = self.state.read().resources.as_ref().and_then(Cached::fresh) {
                return Ok(resources);
            }
        }

        let resources = facade.list_stack_resources(stack_id).await?;
        self.state.write().resources = Some(Cached::new(resources.clone()));
        Ok(resources)
    }

    /// Events whose status is a failure.
    pub async fn error_events(&self, force: bool) -> StackResult<Vec<StackEvent>> {
        Ok(self
            .events(force)
            .await?
            .into_iter()
            .filter(|e| FAILED_STATUSES.contains(&e.status.as_str()))
            .collect())
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Some(handle) = self.refresher.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("identity", &self.identity)
            .field("stack_id", &self.stack_id)
            .field("synthetic", &self.synthetic)
            .field("status", &self.status())
            .finish()
    }
}
