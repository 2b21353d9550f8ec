//! Run command - launch every test stack and clean up afterwards.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use iact_params::ParamResolver;
use iact_stack::{CleanupPolicy, StackReport, Stacker, TestRun};

use super::ProjectArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Comma separated names of the tests to run
    #[arg(short = 'n', long)]
    pub test_names: Option<String>,

    /// Don't delete stacks after the test is complete
    #[arg(long)]
    pub no_delete: bool,

    /// Don't delete failed stacks
    #[arg(long)]
    pub keep_failed: bool,

    /// Exit right after requesting deletion
    #[arg(long)]
    pub dont_wait_for_delete: bool,
}

impl RunArgs {
    fn policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            no_delete: self.no_delete,
            keep_failed: self.keep_failed,
            wait_for_delete: !self.dont_wait_for_delete,
        }
    }
}

pub async fn execute(args: RunArgs, fixture: Option<&std::path::Path>) -> Result<()> {
    let (loader, config) = args.project.load()?;
    let connector = super::connector(fixture)?;

    info!("Testing project: {}", config.project_name());
    let specs = config
        .test_specifications(connector.as_ref(), loader.project_root(), args.test_names.as_deref())
        .await
        .context("Failed to build test specifications")?;

    let resolver = ParamResolver::new(connector.clone())?;
    let specs = resolver.resolve_all(specs).await;

    println!("🚀 Launching {} stack(s)...", specs.len());
    let stacker = Stacker::new(config.project_name(), specs, connector);
    let run = TestRun::new(stacker, args.policy());
    let result = run.run().await;

    println!();
    for report in run.stacker().reports() {
        print_report(&report);
    }
    result?;

    println!();
    println!("✅ All tests passed!");
    Ok(())
}

fn print_report(report: &StackReport) {
    let icon = if report.launch_succeeded { "✅" } else { "❌" };
    println!(
        "   {} {} [{}] {} {}",
        icon,
        report.test_name,
        report.region,
        report.stack_id.as_deref().unwrap_or(&report.stack_name),
        report.status
    );
    if !report.launch_succeeded && !report.status_reason.is_empty() {
        println!("      - {}", report.status_reason);
    }
}
