//! Expansion of merged configuration into per-region test specifications.

use std::path::Path;

use iact_cloud::{CloudConnector, Credential};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{IactConfig, SpecError, TestSpecification};

/// Region used to ask the service for its region list.
pub const DEFAULT_REGION: &str = "cn-hangzhou";

const ALL_REGIONS: &str = "all";

impl ConfigError {
    /// Error code recorded on a specification that failed during expansion.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::TemplateNotFound(_) => "TemplateNotFound",
            ConfigError::InvalidTemplate(_) => "InvalidTemplate",
            _ => "ConfigurationError",
        }
    }
}

/// Split a comma separated test filter.
pub fn parse_test_filter(filter: Option<&str>) -> Vec<String> {
    filter
        .map(|f| {
            f.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

impl IactConfig {
    /// Project name; loading guarantees it is set.
    pub fn project_name(&self) -> &str {
        self.project.name.as_deref().unwrap_or_default()
    }

    /// Credential used for project wide calls.
    pub fn credential(&self) -> &Credential {
        &self.project.auth
    }

    /// Build one specification per (test, region) pair.
    ///
    /// Template problems of a single test are recorded on that test's
    /// specifications instead of failing the whole expansion.
    pub async fn test_specifications(
        &self,
        connector: &dyn CloudConnector,
        project_root: &Path,
        filter: Option<&str>,
    ) -> ConfigResult<Vec<TestSpecification>> {
        let wanted = parse_test_filter(filter);
        let mut all_regions: Option<Vec<String>> = None;
        let mut specs = Vec::new();

        for (name, test) in &self.tests {
            if !wanted.is_empty() && !wanted.contains(name) {
                continue;
            }

            let mut regions: Vec<String> = test.regions.iter().map(|r| r.to_lowercase()).collect();
            if regions.is_empty() || regions.iter().any(|r| r == ALL_REGIONS) {
                if all_regions.is_none() {
                    let client = connector.connect(DEFAULT_REGION, &self.general.auth)?;
                    let listed = client.list_regions().await?;
                    debug!(count = listed.len(), "Expanded region list");
                    all_regions = Some(listed);
                }
                regions = all_regions.clone().unwrap_or_default();
            }
            if regions.is_empty() {
                warn!(test = %name, "Test has no region to run in");
            }

            let (template, error) = match test.template_config.resolve(project_root) {
                Ok(template) => (template, None),
                Err(e) => {
                    warn!(test = %name, "Template could not be resolved: {}", e);
                    (Default::default(), Some(SpecError::new(e.code(), e.to_string())))
                }
            };

            for region in regions {
                specs.push(TestSpecification {
                    test_name: name.clone(),
                    region,
                    template: template.clone(),
                    parameters: test.parameters.clone(),
                    parameters_order: test.parameters_order.clone(),
                    tags: test.tags.clone(),
                    credential: test.auth.clone(),
                    role_name: test.role_name.clone().filter(|r| !r.is_empty()),
                    error: error.clone(),
                });
            }
        }

        if !wanted.is_empty() && specs.is_empty() {
            return Err(ConfigError::NoMatchingTests(wanted.join(",")));
        }
        info!(
            project = self.project_name(),
            count = specs.len(),
            "Prepared test specifications"
        );
        Ok(specs)
    }
}
