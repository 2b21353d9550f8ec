//! # iact_config
//!
//! Configuration layer for iact.
//!
//! Reads the YAML project file (plus an optional global file and command
//! line overrides), merges the `general`, `project` and `tests` sections and
//! expands every test into one [`TestSpecification`] per region.
//!
//! # Example
//!
//! ```rust,no_run
//! use iact_cloud::MockCloud;
//! use iact_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new(".");
//!     let config = loader.load()?;
//!     let specs = config
//!         .test_specifications(&MockCloud::new(), loader.project_root(), None)
//!         .await?;
//!     println!("{} specifications", specs.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod models;
pub mod specs;
pub mod template;

pub use error::{ConfigError, ConfigResult};
pub use loader::{merge_values, ConfigLoader, ConfigOverrides, DEFAULT_CONFIG_FILE, PRODUCT_PREFIX};
pub use models::{
    GeneralConfig, IactConfig, ProjectConfig, SpecError, TemplateConfig, TestConfig,
    TestSpecification,
};
pub use specs::{parse_test_filter, DEFAULT_REGION};
