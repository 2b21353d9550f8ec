//! Backtracking search over the constraint domains of auto parameters.
//!
//! Auto parameters become frames in an ordered arena. A cursor walks the
//! arena: a fresh frame queries its domain under the values chosen by the
//! frames before it, a revisited frame advances to its next candidate. The
//! cursor only ever moves to an immediate neighbour.

use iact_cloud::{
    CloudFacade, ConstraintBehavior, ConstraintQuery, Parameters, TemplateRef,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ResolveError, ResolveResult};
use crate::sentinel::{is_auto, is_current_region};

/// Attempts per constraint query while the service reports a timeout.
pub const MAX_CONSTRAINT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
enum Slot {
    Literal(Value),
    Auto,
}

#[derive(Debug, Clone)]
struct Frame {
    key: String,
    domain: Option<Vec<Value>>,
    index: usize,
}

impl Frame {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            domain: None,
            index: 0,
        }
    }

    fn current(&self) -> Option<&Value> {
        self.domain.as_ref().and_then(|d| d.get(self.index))
    }

    fn reset(&mut self) {
        self.domain = None;
        self.index = 0;
    }
}

enum Candidates {
    Values(Vec<Value>),
    Unsupported,
}

/// What the search needs to ask the constraint service.
pub struct SearchScope<'a> {
    pub facade: &'a dyn CloudFacade,
    pub template: &'a TemplateRef,
    pub order: &'a [String],
    pub region: &'a str,
    pub test_name: &'a str,
}

/// Classified parameters plus the search state over the auto ones.
#[derive(Debug, Clone)]
pub struct Chain {
    entries: Vec<(String, Slot)>,
    frames: Vec<Frame>,
    unresolved: Vec<String>,
}

impl Chain {
    /// Classify raw values in evaluation order. Keys of `order` that are not
    /// in `raw` are skipped.
    pub fn classify(order: &[String], raw: &Parameters, region: &str) -> Self {
        let mut entries = Vec::new();
        let mut frames = Vec::new();

        for key in order {
            let Some(value) = raw.get(key) else {
                continue;
            };
            let slot = match value.as_str() {
                Some(s) if is_auto(s) => {
                    frames.push(Frame::new(key));
                    Slot::Auto
                }
                Some(s) if is_current_region(s) => Slot::Literal(Value::String(region.to_string())),
                _ => Slot::Literal(value.clone()),
            };
            entries.push((key.clone(), slot));
        }

        Self {
            entries,
            frames,
            unresolved: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Auto keys the constraint service could not evaluate.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Literal values plus the values chosen by frames before `cursor`.
    fn context(&self, cursor: usize) -> Parameters {
        let chosen = &self.frames[..cursor.min(self.frames.len())];
        let mut params = Parameters::new();
        for (key, slot) in &self.entries {
            match slot {
                Slot::Literal(v) => {
                    params.insert(key.clone(), v.clone());
                }
                Slot::Auto => {
                    if let Some(v) = chosen.iter().find(|f| &f.key == key).and_then(Frame::current) {
                        params.insert(key.clone(), v.clone());
                    }
                }
            }
        }
        params
    }

    /// Classified literals and every chosen value, in evaluation order.
    /// Unresolved auto keys are absent.
    pub fn assignment(&self) -> Parameters {
        self.context(self.frames.len())
    }

    /// Run the search to completion.
    pub async fn search(&mut self, scope: &SearchScope<'_>) -> ResolveResult<()> {
        let mut cursor = 0;
        let mut dead_end: Option<ResolveError> = None;

        while cursor < self.frames.len() {
            if self.frames[cursor].domain.is_some() {
                let frame = &mut self.frames[cursor];
                frame.index += 1;
                if let Some(value) = frame.current() {
                    debug!(key = %frame.key, value = %value, "Trying next candidate");
                    self.step_forward(&mut cursor);
                    continue;
                }
                if cursor == 0 {
                    return Err(dead_end.unwrap_or_else(|| self.exhausted(scope, 0)));
                }
                debug!(key = %self.frames[cursor].key, "Candidates exhausted, backtracking");
                cursor -= 1;
                continue;
            }

            let key = self.frames[cursor].key.clone();
            let context = self.context(cursor);
            match query(scope, &key, &context).await? {
                Candidates::Unsupported => {
                    debug!(key = %key, "Constraint query not supported, leaving for heuristics");
                    self.unresolved.push(key);
                    self.frames.remove(cursor);
                    if let Some(next) = self.frames.get_mut(cursor) {
                        next.reset();
                    }
                }
                Candidates::Values(values) if values.is_empty() => {
                    if cursor == 0 {
                        let context = serde_json::to_string(&context)?;
                        return Err(ResolveError::NoCandidates {
                            key,
                            context,
                            region: scope.region.to_string(),
                            test: scope.test_name.to_string(),
                        });
                    }
                    debug!(key = %key, "Empty domain, backtracking");
                    dead_end = Some(ResolveError::DeadEnd {
                        key,
                        region: scope.region.to_string(),
                        test: scope.test_name.to_string(),
                    });
                    cursor -= 1;
                }
                Candidates::Values(values) => {
                    debug!(key = %key, candidates = values.len(), "Selected first candidate");
                    let frame = &mut self.frames[cursor];
                    frame.domain = Some(values);
                    frame.index = 0;
                    self.step_forward(&mut cursor);
                }
            }
        }
        Ok(())
    }

    fn step_forward(&mut self, cursor: &mut usize) {
        *cursor += 1;
        if let Some(next) = self.frames.get_mut(*cursor) {
            next.reset();
        }
    }

    fn exhausted(&self, scope: &SearchScope<'_>, at: usize) -> ResolveError {
        let frame = &self.frames[at];
        let domain = frame
            .domain
            .as_ref()
            .map(|d| Value::Array(d.clone()).to_string())
            .unwrap_or_else(|| "[]".to_string());
        ResolveError::Exhausted {
            key: frame.key.clone(),
            region: scope.region.to_string(),
            domain,
            test: scope.test_name.to_string(),
        }
    }
}

async fn query(scope: &SearchScope<'_>, key: &str, context: &Parameters) -> ResolveResult<Candidates> {
    let request = ConstraintQuery {
        template: scope.template.clone(),
        parameters: context.clone(),
        key_filter: vec![key.to_string()],
        parameters_order: scope.order.to_vec(),
    };

    for attempt in 1..=MAX_CONSTRAINT_ATTEMPTS {
        let result = scope.facade.get_parameter_constraints(&request).await?;
        match result.behavior {
            ConstraintBehavior::Supported => return Ok(Candidates::Values(result.allowed_values)),
            ConstraintBehavior::NotSupported => return Ok(Candidates::Unsupported),
            ConstraintBehavior::QueryError if result.is_timeout() => {
                debug!(key, attempt, "Constraint query timed out");
            }
            ConstraintBehavior::QueryError => {
                warn!(
                    key,
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "Constraint query failed, treating parameter as unsupported"
                );
                return Ok(Candidates::Unsupported);
            }
        }
    }

    Err(ResolveError::ConstraintTimeout {
        key: key.to_string(),
        region: scope.region.to_string(),
        test: scope.test_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::{CloudConnector, ConstraintRule, Credential, MockCloud};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn order(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    async fn run(cloud: &MockCloud, raw: &Parameters, keys: &[&str]) -> (Chain, ResolveResult<()>) {
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let template = TemplateRef::from_body("{}");
        let order = order(keys);
        let scope = SearchScope {
            facade: facade.as_ref(),
            template: &template,
            order: &order,
            region: "r1",
            test_name: "t",
        };
        let mut chain = Chain::classify(&order, raw, "r1");
        let result = chain.search(&scope).await;
        (chain, result)
    }

    #[test]
    fn test_classification() {
        let mut raw = params(&[
            ("Zone", "$[iact3-auto]"),
            ("Region", "$[iact3-current-region]"),
            ("Size", "large"),
        ]);
        raw.insert("Count".into(), json!(2));
        let chain = Chain::classify(&order(&["Zone", "Region", "Size", "Count", "Absent"]), &raw, "r1");

        assert_eq!(chain.frames.len(), 1);
        let assignment = chain.assignment();
        assert_eq!(assignment["Region"], json!("r1"));
        assert_eq!(assignment["Count"], json!(2));
        assert!(!assignment.contains_key("Zone"));
        assert!(!assignment.contains_key("Absent"));
    }

    #[tokio::test]
    async fn test_backtracks_to_second_zone() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("Zone", vec![json!("z-a"), json!("z-b")]))
            .add_constraint(ConstraintRule::allow("Type", vec![]).when("Zone", "z-a"))
            .add_constraint(ConstraintRule::allow("Type", vec![json!("t1")]).when("Zone", "z-b"));
        let raw = params(&[("Zone", "$[iact3-auto]"), ("Type", "$[iact3-auto]")]);

        let (chain, result) = run(&cloud, &raw, &["Zone", "Type"]).await;
        result.unwrap();
        let assignment = chain.assignment();
        assert_eq!(assignment["Zone"], json!("z-b"));
        assert_eq!(assignment["Type"], json!("t1"));

        let type_queries = cloud.get_method_calls("get_parameter_constraints");
        let contexts: Vec<Option<Value>> = type_queries
            .iter()
            .filter(|c| c.target.as_deref() == Some("Type"))
            .map(|c| c.parameters.as_ref().and_then(|p| p.get("Zone").cloned()))
            .collect();
        assert_eq!(contexts, vec![Some(json!("z-a")), Some(json!("z-b"))]);
    }

    #[tokio::test]
    async fn test_empty_head_domain_is_fatal() {
        let cloud = MockCloud::new().add_constraint(ConstraintRule::allow("Zone", vec![]));
        let raw = params(&[("Zone", "$[iact3-auto]"), ("Size", "large")]);

        let (_, result) = run(&cloud, &raw, &["Size", "Zone"]).await;
        match result {
            Err(ResolveError::NoCandidates { key, context, region, .. }) => {
                assert_eq!(key, "Zone");
                assert_eq!(region, "r1");
                assert_eq!(context, r#"{"Size":"large"}"#);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_after_dead_end() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("Zone", vec![json!("z-a")]))
            .add_constraint(ConstraintRule::allow("Type", vec![]));
        let raw = params(&[("Zone", "$[iact3-auto]"), ("Type", "$[iact3-auto]")]);

        let (_, result) = run(&cloud, &raw, &["Zone", "Type"]).await;
        assert!(matches!(result, Err(ResolveError::DeadEnd { ref key, .. }) if key == "Type"));
    }

    #[tokio::test]
    async fn test_not_supported_is_spliced_out() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::not_supported("Name"))
            .add_constraint(ConstraintRule::allow("Zone", vec![json!("z-a")]));
        let raw = params(&[("Name", "$[iact3-auto]"), ("Zone", "$[iact3-auto]")]);

        let (chain, result) = run(&cloud, &raw, &["Name", "Zone"]).await;
        result.unwrap();
        assert_eq!(chain.unresolved(), &["Name".to_string()]);
        assert_eq!(chain.assignment()["Zone"], json!("z-a"));
        assert!(!chain.assignment().contains_key("Name"));
    }

    #[tokio::test]
    async fn test_timeout_retries_then_succeeds() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::timeout("Zone", 2))
            .add_constraint(ConstraintRule::allow("Zone", vec![json!("z-a")]));
        let raw = params(&[("Zone", "$[iact3-auto]")]);

        let (chain, result) = run(&cloud, &raw, &["Zone"]).await;
        result.unwrap();
        assert_eq!(chain.assignment()["Zone"], json!("z-a"));
        assert_eq!(cloud.get_method_calls("get_parameter_constraints").len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_budget_exhausted() {
        let cloud = MockCloud::new().add_constraint(ConstraintRule::timeout("Zone", 3));
        let raw = params(&[("Zone", "$[iact3-auto]")]);

        let (_, result) = run(&cloud, &raw, &["Zone"]).await;
        assert!(matches!(result, Err(ResolveError::ConstraintTimeout { .. })));
    }

    #[tokio::test]
    async fn test_non_timeout_query_error_is_unsupported() {
        let mut rule = ConstraintRule::allow("Zone", vec![]);
        rule.behavior = ConstraintBehavior::QueryError;
        rule.reason = Some("permission denied".into());
        let cloud = MockCloud::new().add_constraint(rule);
        let raw = params(&[("Zone", "$[iact3-auto]")]);

        let (chain, result) = run(&cloud, &raw, &["Zone"]).await;
        result.unwrap();
        assert_eq!(chain.unresolved(), &["Zone".to_string()]);
    }

    #[tokio::test]
    async fn test_three_level_backtrack_resets_stale_frames() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("A", vec![json!("a1"), json!("a2")]))
            .add_constraint(ConstraintRule::allow("B", vec![json!("b1")]))
            .add_constraint(ConstraintRule::allow("C", vec![json!("c1")]).when("A", "a2"))
            .add_constraint(ConstraintRule::allow("C", vec![]));
        let raw = params(&[("A", "$[iact3-auto]"), ("B", "$[iact3-auto]"), ("C", "$[iact3-auto]")]);

        let (chain, result) = run(&cloud, &raw, &["A", "B", "C"]).await;
        result.unwrap();
        let assignment = chain.assignment();
        assert_eq!(assignment["A"], json!("a2"));
        assert_eq!(assignment["B"], json!("b1"));
        assert_eq!(assignment["C"], json!("c1"));
    }
}
