//! Entry point resolving the auto parameters of test specifications.

use std::sync::Arc;

use iact_cloud::{fan_out, CloudConnector, CloudFacade, Parameters};
use iact_config::{SpecError, TestSpecification};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::chain::{Chain, SearchScope};
use crate::error::{ResolveError, ResolveResult};
use crate::heuristics::ResolutionContext;
use crate::order::{evaluation_order, TEMPLATE_FETCH_TIMEOUT};
use crate::patterns::KeyPatterns;
use crate::sentinel::{is_auto_value, is_current_region};

/// Resolves placeholder parameters against the cloud.
///
/// Each specification gets its own region client and resolution context, so
/// concurrent resolutions share nothing but the connector.
pub struct ParamResolver {
    connector: Arc<dyn CloudConnector>,
    patterns: KeyPatterns,
    http: reqwest::Client,
    seed: Option<u64>,
}

impl ParamResolver {
    pub fn new(connector: Arc<dyn CloudConnector>) -> ResolveResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(TEMPLATE_FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            connector,
            patterns: KeyPatterns::new()?,
            http,
            seed: None,
        })
    }

    /// Seed generated names and passwords, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Resolve one specification's parameters.
    pub async fn resolve(&self, spec: &TestSpecification) -> ResolveResult<Parameters> {
        debug!(test = %spec.test_name, region = %spec.region, "Resolving parameters");
        let raw = &spec.parameters;

        if !raw.values().any(is_auto_value) {
            return Ok(raw
                .iter()
                .map(|(k, v)| {
                    let value = match v.as_str() {
                        Some(s) if is_current_region(s) => serde_json::Value::String(spec.region.clone()),
                        _ => v.clone(),
                    };
                    (k.clone(), value)
                })
                .collect());
        }

        let facade = self.connector.connect(&spec.region, &spec.credential)?;
        self.resolve_with(facade.as_ref(), spec).await
    }

    async fn resolve_with(
        &self,
        facade: &dyn CloudFacade,
        spec: &TestSpecification,
    ) -> ResolveResult<Parameters> {
        let raw = &spec.parameters;
        let order = evaluation_order(
            facade,
            &self.http,
            &spec.template,
            &spec.parameters_order,
            raw,
        )
        .await?;

        let mut chain = Chain::classify(&order, raw, &spec.region);
        if !chain.is_empty() {
            let scope = SearchScope {
                facade,
                template: &spec.template,
                order: &order,
                region: &spec.region,
                test_name: &spec.test_name,
            };
            chain.search(&scope).await?;
        }

        let mut params = raw.clone();
        for (key, value) in chain.assignment() {
            params.insert(key, value);
        }

        if !chain.unresolved().is_empty() {
            let mut ctx = ResolutionContext::new(facade, &self.patterns, self.rng());
            ctx.apply(&mut params, chain.unresolved(), raw).await?;
        }
        Ok(params)
    }

    /// Resolve every specification concurrently.
    ///
    /// Failures are recorded on the failing specification; siblings are
    /// unaffected. Specifications that already carry an error are returned
    /// untouched.
    pub async fn resolve_all(&self, specs: Vec<TestSpecification>) -> Vec<TestSpecification> {
        fan_out(specs, |mut spec| async move {
            if spec.error.is_some() {
                return spec;
            }
            match self.resolve(&spec).await {
                Ok(params) => {
                    info!(test = %spec.test_name, region = %spec.region, "Parameters resolved");
                    spec.parameters = params;
                }
                Err(e) => {
                    warn!(
                        test = %spec.test_name,
                        region = %spec.region,
                        "Parameter resolution failed: {}", e
                    );
                    spec.error = Some(spec_error(&e));
                }
            }
            spec
        })
        .await
    }
}

fn spec_error(err: &ResolveError) -> SpecError {
    SpecError::new(err.code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::{ConstraintRule, MockCloud, TemplateRef};
    use serde_json::json;

    fn spec(region: &str) -> TestSpecification {
        TestSpecification::new("default", region, TemplateRef::from_body("{}"))
    }

    #[tokio::test]
    async fn test_no_auto_values_skips_the_cloud() {
        let cloud = MockCloud::new();
        let resolver = ParamResolver::new(Arc::new(cloud.clone())).unwrap();
        let spec = spec("cn-beijing")
            .with_parameter("Region", "$[iact3-current_region]")
            .with_parameter("Size", 3);

        let params = resolver.resolve(&spec).await.unwrap();
        assert_eq!(params["Region"], json!("cn-beijing"));
        assert_eq!(params["Size"], json!(3));
        assert_eq!(cloud.call_count(), 0);
    }

    #[tokio::test]
    async fn test_output_keeps_raw_key_order() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("ZoneId", vec![json!("z-1")]));
        let resolver = ParamResolver::new(Arc::new(cloud)).unwrap().with_seed(3);
        let spec = spec("r1")
            .with_parameter("Name", "$[iact3-auto]")
            .with_parameter("ZoneId", "$[iact3-auto]")
            .with_parameter("Size", "small")
            .with_parameters_order(vec!["ZoneId".into()]);

        let params = resolver.resolve(&spec).await.unwrap();
        let keys: Vec<&String> = params.keys().collect();
        assert_eq!(keys, vec!["Name", "ZoneId", "Size"]);
        assert_eq!(params["ZoneId"], json!("z-1"));
        assert!(params["Name"].as_str().unwrap().starts_with("iact3-"));
    }

    #[tokio::test]
    async fn test_resolve_all_isolates_failures() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("ZoneId", vec![json!("z-1")]).in_region("good"))
            .add_constraint(ConstraintRule::allow("ZoneId", vec![]).in_region("bad"));
        let resolver = ParamResolver::new(Arc::new(cloud)).unwrap();

        let specs = vec![
            spec("good").with_parameter("ZoneId", "$[iact3-auto]"),
            spec("bad").with_parameter("ZoneId", "$[iact3-auto]"),
            spec("skipped").with_error(SpecError::new("InvalidTemplate", "broken")),
        ];
        let resolved = resolver.resolve_all(specs).await;

        assert_eq!(resolved[0].parameters["ZoneId"], json!("z-1"));
        assert!(resolved[0].error.is_none());

        let error = resolved[1].error.as_ref().unwrap();
        assert_eq!(error.code, "ResolutionExhausted");
        assert!(error.message.contains("ZoneId"));
        assert!(error.message.contains("bad"));

        assert_eq!(resolved[2].error.as_ref().unwrap().code, "InvalidTemplate");
    }
}
