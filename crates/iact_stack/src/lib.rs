//! # iact_stack
//!
//! Stack orchestration for iact test runs.
//!
//! Every resolved test specification becomes one stack. Stacks are created
//! concurrently, refreshed in the background until they settle, and deleted
//! according to the run's cleanup policy.
//!
//! # Features
//!
//! - **Stack Lifecycle**: create, refresh, delete, with cached events and resources
//! - **Group Operations**: status snapshots, filtered deletion, aggregate failure reporting
//! - **Preview**: dry-run every test to list the resources it would create
//! - **Interrupt Handling**: stacks already launched are deleted when a run is cancelled
//! - **Discovery**: find stacks of earlier runs by tag and delete them in batches
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use iact_cloud::{MockCloud, TemplateRef};
//! use iact_config::TestSpecification;
//! use iact_stack::{CleanupPolicy, Stacker, TestRun};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let specs = vec![TestSpecification::new(
//!         "default",
//!         "cn-hangzhou",
//!         TemplateRef::from_body("ROSTemplateFormatVersion: '2015-09-01'"),
//!     )];
//!     let stacker = Stacker::new("demo", specs, Arc::new(MockCloud::new()));
//!     TestRun::new(stacker, CleanupPolicy::default()).run().await?;
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod naming;
pub mod preview;
pub mod progress;
pub mod run;
pub mod stack;
pub mod stacker;
pub mod status;

pub use discovery::{clean_stacks, discover_stacks, regions_or_all, StackListing, CLEAN_BATCH_SIZE};
pub use error::{StackError, StackResult};
pub use preview::StackPreview;
pub use progress::{ProgressReporter, DEFAULT_POLL_INTERVAL};
pub use run::{CleanupPolicy, TestRun};
pub use stack::{Stack, StackIdentity, StackReport, CACHE_TTL, REFRESH_INTERVAL};
pub use stacker::{SnapshotEntry, StackFilter, Stacker, StatusSnapshot, STACK_TIMEOUT_MINUTES};
pub use status::{launch_outcome, StatusBucket};
