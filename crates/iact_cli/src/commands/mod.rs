//! CLI command definitions.
//!
//! Every command works on one project: a directory holding a `.iact3.yml`
//! file and the templates it points to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use iact_cloud::{CloudConnector, MockCloud};
use iact_config::{ConfigLoader, ConfigOverrides, IactConfig};

pub mod clean;
pub mod list;
pub mod params;
pub mod preview;
pub mod run;

/// iact3 - functional tests for infrastructure-as-code templates
#[derive(Parser)]
#[command(name = "iact3")]
#[command(version, about = "iact3 - functional tests for infrastructure-as-code templates")]
#[command(long_about = r#"
iact3 launches every configured test of a template as a real stack in each
requested region, waits for the stacks to settle, reports failures and
deletes what it created.

COMMANDS:
  test run     → Launch, watch and clean up the project's stacks
  test params  → Print the resolved parameters of every test
  test preview → List the resources every test would create
  test list    → List stacks created by iact3
  test clean   → Delete stacks created by iact3

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Stack failure
  4 - Configuration error
  5 - Parameter resolution error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Offline cloud fixture (YAML) used as the cloud backend
    #[arg(long, global = true, env = "IACT3_FIXTURE")]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Template testing commands
    #[command(subcommand)]
    Test(TestCommands),
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Test whether templates launch successfully
    Run(run::RunArgs),

    /// Resolve and print test parameters
    Params(params::ParamsArgs),

    /// Preview the resources every test would create
    Preview(preview::PreviewArgs),

    /// List stacks created by iact3
    List(list::ListArgs),

    /// Delete stacks created by iact3
    Clean(clean::CleanArgs),
}

/// Options shared by commands that read the project configuration.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Root directory of the project
    #[arg(short, long, default_value = ".")]
    pub project_path: PathBuf,

    /// Configuration file, relative to the project path
    #[arg(short, long)]
    pub config_file: Option<PathBuf>,

    /// Template file or directory, overrides the configured location
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Comma separated regions, overrides the configured regions
    #[arg(short, long, value_delimiter = ',')]
    pub regions: Vec<String>,
}

impl ProjectArgs {
    pub fn loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::new(&self.project_path).with_overrides(ConfigOverrides {
            regions: (!self.regions.is_empty()).then(|| self.regions.clone()),
            template_location: self.template.clone(),
            project_name: None,
        });
        if let Some(file) = &self.config_file {
            loader = loader.with_config_file(file);
        }
        loader
    }

    pub fn load(&self) -> Result<(ConfigLoader, IactConfig)> {
        let loader = self.loader();
        let config = loader
            .load()
            .with_context(|| format!("Failed to load {}", loader.config_path().display()))?;
        Ok((loader, config))
    }
}

/// Build the cloud backend.
pub fn connector(fixture: Option<&Path>) -> Result<Arc<dyn CloudConnector>> {
    match fixture {
        Some(path) => {
            debug!("Loading cloud fixture {:?}", path);
            let cloud = MockCloud::load(path)
                .with_context(|| format!("Failed to load cloud fixture {}", path.display()))?;
            Ok(Arc::new(cloud))
        }
        None => anyhow::bail!(
            "No cloud backend configured: pass the --fixture argument or set IACT3_FIXTURE"
        ),
    }
}
