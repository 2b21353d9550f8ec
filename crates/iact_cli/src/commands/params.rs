//! Params command - print the resolved parameters of every test.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use iact_config::TestSpecification;
use iact_params::ParamResolver;

use super::ProjectArgs;

#[derive(Args, Debug)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Comma separated names of the tests to resolve
    #[arg(short = 'n', long)]
    pub test_names: Option<String>,
}

/// One (test, region) entry of the output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResolvedParameters {
    pub test_name: String,
    pub test_region: String,
    /// The parameter mapping, or the error message when resolution failed.
    pub parameters: Value,
}

impl From<TestSpecification> for ResolvedParameters {
    fn from(spec: TestSpecification) -> Self {
        let parameters = match spec.error {
            Some(error) => Value::String(error.message),
            None => Value::Object(spec.parameters),
        };
        Self {
            test_name: spec.test_name,
            test_region: spec.region,
            parameters,
        }
    }
}

pub async fn execute(args: ParamsArgs, fixture: Option<&std::path::Path>) -> Result<()> {
    let (loader, config) = args.project.load()?;
    let connector = super::connector(fixture)?;

    let specs = config
        .test_specifications(connector.as_ref(), loader.project_root(), args.test_names.as_deref())
        .await
        .context("Failed to build test specifications")?;
    let resolved = ParamResolver::new(connector)?.resolve_all(specs).await;

    let output: Vec<ResolvedParameters> = resolved.into_iter().map(Into::into).collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::TemplateRef;
    use iact_config::SpecError;
    use serde_json::json;

    #[test]
    fn test_output_shape() {
        let ok = TestSpecification::new("ecs", "cn-hangzhou", TemplateRef::default())
            .with_parameter("ZoneId", "cn-hangzhou-h");
        let failed = TestSpecification::new("rds", "cn-beijing", TemplateRef::default())
            .with_error(SpecError::new("ResolutionExhausted", "no available value found"));

        let output = serde_json::to_value(vec![
            ResolvedParameters::from(ok),
            ResolvedParameters::from(failed),
        ])
        .unwrap();

        assert_eq!(
            output,
            json!([
                {"TestName": "ecs", "TestRegion": "cn-hangzhou", "Parameters": {"ZoneId": "cn-hangzhou-h"}},
                {"TestName": "rds", "TestRegion": "cn-beijing", "Parameters": "no available value found"}
            ])
        );
    }
}
