//! Preview command - list the resources every test would create.

use anyhow::{bail, Context, Result};
use clap::Args;

use iact_params::ParamResolver;
use iact_stack::{StackPreview, Stacker};

use super::ProjectArgs;

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Comma separated names of the tests to preview
    #[arg(short = 'n', long)]
    pub test_names: Option<String>,

    /// Print the previews as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: PreviewArgs, fixture: Option<&std::path::Path>) -> Result<()> {
    let (loader, config) = args.project.load()?;
    let connector = super::connector(fixture)?;

    let specs = config
        .test_specifications(connector.as_ref(), loader.project_root(), args.test_names.as_deref())
        .await
        .context("Failed to build test specifications")?;
    let specs = ParamResolver::new(connector.clone())?.resolve_all(specs).await;

    let previews = Stacker::new(config.project_name(), specs, connector)
        .preview_all()
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&previews)?);
    } else {
        for preview in &previews {
            print!("{}", render_preview(preview)?);
        }
    }

    let failed = previews.iter().filter(|p| p.is_failed()).count();
    if failed > 0 {
        bail!("{} of {} preview(s) failed", failed, previews.len());
    }
    Ok(())
}

fn render_preview(preview: &StackPreview) -> Result<String> {
    let mut out = format!("📋 {} [{}]\n", preview.test_name, preview.region);
    if let Some(err) = &preview.error {
        out.push_str(&format!("   ❌ {}\n", err));
        return Ok(out);
    }

    let id_width = preview
        .resources
        .iter()
        .map(|r| r.logical_id.len())
        .max()
        .unwrap_or(0);
    for resource in &preview.resources {
        let short_type = resource
            .resource_type
            .strip_prefix("ALIYUN::")
            .unwrap_or(&resource.resource_type);
        out.push_str(&format!(
            "   {:<w$}  {}\n",
            resource.logical_id,
            short_type,
            w = id_width
        ));
        for line in serde_json::to_string_pretty(&resource.properties)?.lines() {
            out.push_str(&format!("      {}\n", line));
        }
    }
    Ok(out)
}
