//! Clean command - delete stacks left behind by earlier runs.

use anyhow::Result;
use clap::Args;
use tracing::info;

use iact_cloud::Tags;
use iact_stack::{clean_stacks, discover_stacks, ProgressReporter};

use super::list::project_credential;
use super::ProjectArgs;

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only delete this stack
    #[arg(long)]
    pub stack_id: Option<String>,
}

pub async fn execute(args: CleanArgs, fixture: Option<&std::path::Path>) -> Result<()> {
    let connector = super::connector(fixture)?;
    let credential = project_credential(&args.project);

    let stacks = discover_stacks(
        connector.as_ref(),
        &credential,
        &args.project.regions,
        &Tags::new(),
        args.stack_id.as_deref(),
    )
    .await?;
    if stacks.is_empty() {
        println!("No stacks to delete.");
        return Ok(());
    }

    info!("Deleting {} stack(s)", stacks.len());
    let deleted = clean_stacks(connector, &credential, stacks, &ProgressReporter::new()).await?;
    println!("🧹 Deleted {} stack(s)", deleted);
    Ok(())
}
