//! # iact_cloud
//!
//! Cloud service facade for iact.
//!
//! This crate defines the contract every region client fulfils: stack
//! lifecycle and preview calls, tag listings, the parameter constraint query and the
//! network inventory lookups used to fill placeholder parameters.
//!
//! # Features
//!
//! - **Facade Traits**: [`CloudConnector`] builds region-bound [`CloudFacade`] clients
//! - **Paging**: concurrent page fetching and order-preserving fan-out
//! - **Mock Cloud**: scripted in-memory cloud for tests and offline runs
//!
//! # Example
//!
//! ```rust,no_run
//! use iact_cloud::{CloudConnector, Credential, MockCloud};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cloud = MockCloud::new().with_regions(vec!["cn-hangzhou".to_string()]);
//!     let client = cloud.connect("cn-hangzhou", &Credential::default())?;
//!     println!("Regions: {:?}", client.list_regions().await?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod facade;
pub mod mock;
pub mod models;
pub mod paging;

pub use error::{CloudError, CloudResult};
pub use facade::{CloudConnector, CloudFacade};
pub use mock::{
    CapturedCall, ConstraintRule, MockCloud, MockCloudClient, MockFixture, RegionalSecurityGroup,
    RegionalSubnet, ServiceErrorSpec, StackScript,
};
pub use models::{
    ConstraintBehavior, ConstraintQuery, ConstraintQueryResult, CreateStackRequest, Credential,
    Page, PageRequest, Parameters, PreviewResource, PreviewStackRequest, SecurityGroupInfo,
    StackDescription, StackEvent, StackResource, StackSummary, SubnetInfo, Tags, TemplateRef,
};
pub use paging::{fan_out, fetch_all, DEFAULT_PAGE_SIZE};
