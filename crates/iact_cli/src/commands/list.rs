//! List command - show stacks created by iact3.

use anyhow::Result;
use clap::Args;

use iact_cloud::{Credential, Tags};
use iact_stack::{discover_stacks, StackListing};

use super::ProjectArgs;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

/// Credential from the project file when there is one.
pub(crate) fn project_credential(project: &ProjectArgs) -> Credential {
    project
        .loader()
        .load()
        .map(|config| config.credential().clone())
        .unwrap_or_default()
}

pub async fn execute(args: ListArgs, fixture: Option<&std::path::Path>) -> Result<()> {
    let connector = super::connector(fixture)?;
    let credential = project_credential(&args.project);

    let stacks = discover_stacks(
        connector.as_ref(),
        &credential,
        &args.project.regions,
        &Tags::new(),
        None,
    )
    .await?;
    let listings: Vec<StackListing> = stacks.iter().map(StackListing::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    if listings.is_empty() {
        println!("No stacks found.");
        return Ok(());
    }
    print!("{}", render_table(&listings));
    Ok(())
}

fn render_table(listings: &[StackListing]) -> String {
    let project_width = column_width("ProjectName", listings, |l| l.project_name.as_deref());
    let test_width = column_width("TestName", listings, |l| l.test_name.as_deref());
    let stack_width = column_width("StackName", listings, |l| Some(l.stack_name.as_str()));

    let mut out = format!(
        "{:<pw$}  {:<tw$}  {:<sw$}  {}\n",
        "ProjectName",
        "TestName",
        "StackName",
        "Region",
        pw = project_width,
        tw = test_width,
        sw = stack_width
    );
    for l in listings {
        out.push_str(&format!(
            "{:<pw$}  {:<tw$}  {:<sw$}  {}\n",
            l.project_name.as_deref().unwrap_or("-"),
            l.test_name.as_deref().unwrap_or("-"),
            l.stack_name,
            l.region,
            pw = project_width,
            tw = test_width,
            sw = stack_width
        ));
    }
    out
}

fn column_width<'a>(
    header: &str,
    listings: &'a [StackListing],
    value: impl Fn(&'a StackListing) -> Option<&'a str>,
) -> usize {
    listings
        .iter()
        .filter_map(value)
        .map(str::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}
