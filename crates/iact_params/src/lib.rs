//! # iact_params
//!
//! Auto parameter resolution for iact.
//!
//! Parameters whose value is the auto sentinel are resolved in two passes:
//!
//! - **Constraint search**: a backtracking search over the allowed-value
//!   domains reported by the constraint service, each domain queried under
//!   the values chosen so far
//! - **Name patterns**: keys the service cannot evaluate are filled from the
//!   network inventory or generated (names, passwords, uuids)
//!
//! Failures are recorded on the affected [`iact_config::TestSpecification`]
//! and never abort sibling specifications.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use iact_cloud::{MockCloud, TemplateRef};
//! use iact_config::TestSpecification;
//! use iact_params::ParamResolver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = ParamResolver::new(Arc::new(MockCloud::new()))?;
//!     let spec = TestSpecification::new("default", "cn-hangzhou", TemplateRef::from_body("{}"))
//!         .with_parameter("InstanceName", "$[iact3-auto]");
//!     let resolved = resolver.resolve_all(vec![spec]).await;
//!     println!("{:?}", resolved[0].parameters);
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod error;
pub mod generate;
pub mod heuristics;
pub mod order;
pub mod patterns;
pub mod resolver;
pub mod sentinel;

pub use chain::{Chain, SearchScope, MAX_CONSTRAINT_ATTEMPTS};
pub use error::{ResolveError, ResolveResult};
pub use heuristics::ResolutionContext;
pub use order::{TEMPLATE_FETCH_TIMEOUT, TEMPLATE_MAX_SIZE};
pub use patterns::{KeyKind, KeyPatterns};
pub use resolver::ParamResolver;
pub use sentinel::{auto_sentinel, current_region_sentinel, is_auto, is_current_region};
