//! Mock cloud for testing and offline runs.
//!
//! Provides a configurable in-memory implementation of [`CloudConnector`] and
//! [`CloudFacade`]. Constraint answers, network inventory and stack status
//! progressions are scripted either in code or from a YAML fixture, and every
//! call is captured for verification.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CloudError, CloudResult};
use crate::facade::{CloudConnector, CloudFacade};
use crate::models::{
    ConstraintBehavior, ConstraintQuery, ConstraintQueryResult, CreateStackRequest, Credential,
    Page, PageRequest, Parameters, PreviewResource, PreviewStackRequest, SecurityGroupInfo,
    StackDescription, StackEvent, StackResource, StackSummary, SubnetInfo, Tags, TemplateRef,
};

/// Scripted answer of the constraint API for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRule {
    pub key: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Parameter values that must be present in the query.
    #[serde(default)]
    pub when: Parameters,
    #[serde(default)]
    pub behavior: ConstraintBehavior,
    #[serde(default)]
    pub allowed_values: Vec<Value>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Stop matching after this many answers.
    #[serde(default)]
    pub times: Option<usize>,
}

impl ConstraintRule {
    pub fn allow(key: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            region: None,
            when: Parameters::new(),
            behavior: ConstraintBehavior::Supported,
            allowed_values: values,
            reason: None,
            times: None,
        }
    }

    pub fn not_supported(key: impl Into<String>) -> Self {
        Self {
            behavior: ConstraintBehavior::NotSupported,
            reason: Some("parameter is not supported by the constraint query".to_string()),
            ..Self::allow(key, Vec::new())
        }
    }

    /// Answer with a transient timeout `times` times.
    pub fn timeout(key: impl Into<String>, times: usize) -> Self {
        Self {
            behavior: ConstraintBehavior::QueryError,
            reason: Some("query timeout".to_string()),
            times: Some(times),
            ..Self::allow(key, Vec::new())
        }
    }

    pub fn when(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.when.insert(key.into(), value.into());
        self
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn matches(&self, region: &str, query: &ConstraintQuery) -> bool {
        if query.key() != Some(self.key.as_str()) {
            return false;
        }
        if let Some(r) = &self.region {
            if r != region {
                return false;
            }
        }
        self.when
            .iter()
            .all(|(k, v)| query.parameters.get(k) == Some(v))
    }

    fn to_result(&self) -> ConstraintQueryResult {
        ConstraintQueryResult {
            behavior: self.behavior,
            allowed_values: self.allowed_values.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Provider error returned by a scripted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceErrorSpec {
    pub code: String,
    pub message: String,
}

impl ServiceErrorSpec {
    fn to_error(&self) -> CloudError {
        CloudError::service(&self.code, &self.message)
    }
}

fn default_create_statuses() -> Vec<String> {
    vec!["CREATE_IN_PROGRESS".to_string(), "CREATE_COMPLETE".to_string()]
}

fn default_delete_statuses() -> Vec<String> {
    vec!["DELETE_COMPLETE".to_string()]
}

/// Scripted lifecycle for stacks matching a region and name fragment.
///
/// Each describe call returns the next status of the sequence, repeating the
/// last one once exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackScript {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
    #[serde(default)]
    pub create_error: Option<ServiceErrorSpec>,
    #[serde(default)]
    pub delete_error: Option<ServiceErrorSpec>,
    #[serde(default = "default_create_statuses")]
    pub statuses: Vec<String>,
    #[serde(default = "default_delete_statuses")]
    pub delete_statuses: Vec<String>,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub events: Vec<StackEvent>,
    #[serde(default)]
    pub resources: Vec<StackResource>,
}

impl Default for StackScript {
    fn default() -> Self {
        Self {
            region: None,
            name_contains: None,
            create_error: None,
            delete_error: None,
            statuses: default_create_statuses(),
            delete_statuses: default_delete_statuses(),
            status_reason: None,
            events: Vec::new(),
            resources: Vec::new(),
        }
    }
}

impl StackScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn named(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn statuses(mut self, statuses: &[&str]) -> Self {
        self.statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn delete_statuses(mut self, statuses: &[&str]) -> Self {
        self.delete_statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    pub fn fail_create(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.create_error = Some(ServiceErrorSpec {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn fail_delete(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.delete_error = Some(ServiceErrorSpec {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn with_events(mut self, events: Vec<StackEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_resources(mut self, resources: Vec<StackResource>) -> Self {
        self.resources = resources;
        self
    }

    fn matches(&self, region: &str, stack_name: &str) -> bool {
        let region_ok = self.region.as_deref().map_or(true, |r| r == region);
        let name_ok = self
            .name_contains
            .as_deref()
            .map_or(true, |n| stack_name.contains(n));
        region_ok && name_ok
    }
}

/// Subnet bound to a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalSubnet {
    pub region: String,
    #[serde(flatten)]
    pub subnet: SubnetInfo,
}

/// Security group bound to a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalSecurityGroup {
    pub region: String,
    #[serde(flatten)]
    pub group: SecurityGroupInfo,
}

/// YAML fixture describing a mock cloud.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockFixture {
    pub regions: Vec<String>,
    pub constraints: Vec<ConstraintRule>,
    pub subnets: Vec<RegionalSubnet>,
    pub security_groups: Vec<RegionalSecurityGroup>,
    pub stacks: Vec<StackScript>,
    /// Template bodies keyed by template id or url.
    pub templates: HashMap<String, String>,
    pub existing_stacks: Vec<StackSummary>,
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub region: String,
    pub target: Option<String>,
    pub parameters: Option<Parameters>,
}

#[derive(Debug, Clone)]
struct MockStack {
    summary: StackSummary,
    script: StackScript,
    cursor: usize,
    deleting: bool,
}

impl MockStack {
    fn advance(&mut self) -> String {
        let (sequence, fallback) = if self.deleting {
            (&self.script.delete_statuses, "DELETE_COMPLETE")
        } else {
            (&self.script.statuses, "CREATE_COMPLETE")
        };
        let status = if sequence.is_empty() {
            fallback.to_string()
        } else {
            sequence[self.cursor.min(sequence.len() - 1)].clone()
        };
        self.cursor += 1;
        self.summary.status = status.clone();
        status
    }
}

#[derive(Default)]
struct MockState {
    regions: RwLock<Vec<String>>,
    constraints: RwLock<Vec<(ConstraintRule, usize)>>,
    subnets: RwLock<Vec<RegionalSubnet>>,
    security_groups: RwLock<Vec<RegionalSecurityGroup>>,
    scripts: RwLock<Vec<StackScript>>,
    templates: RwLock<HashMap<String, String>>,
    stacks: RwLock<Vec<MockStack>>,
    unreachable_regions: RwLock<Vec<String>>,
    captured_calls: RwLock<Vec<CapturedCall>>,
    next_id: AtomicUsize,
}

/// Mock cloud connector.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// code under test holds another.
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<MockState>,
}

impl MockCloud {
    /// Create an empty mock cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mock cloud from a parsed fixture.
    pub fn from_fixture(fixture: MockFixture) -> Self {
        let mut cloud = Self::new()
            .with_regions(fixture.regions)
            .with_constraints(fixture.constraints);
        for subnet in fixture.subnets {
            cloud = cloud.add_subnet(subnet.region, subnet.subnet);
        }
        for sg in fixture.security_groups {
            cloud = cloud.add_security_group(sg.region, sg.group);
        }
        for script in fixture.stacks {
            cloud = cloud.add_stack_script(script);
        }
        for (key, body) in fixture.templates {
            cloud = cloud.add_template(key, body);
        }
        for summary in fixture.existing_stacks {
            cloud = cloud.add_existing_stack(summary);
        }
        cloud
    }

    /// Load a YAML fixture from disk.
    pub fn load(path: &Path) -> CloudResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: MockFixture = serde_yaml::from_str(&content)?;
        debug!("Loaded mock cloud fixture from {:?}", path);
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_regions(self, regions: Vec<String>) -> Self {
        *self.state.regions.write() = regions;
        self
    }

    pub fn with_constraints(self, rules: Vec<ConstraintRule>) -> Self {
        self.state
            .constraints
            .write()
            .extend(rules.into_iter().map(|r| (r, 0)));
        self
    }

    pub fn add_constraint(self, rule: ConstraintRule) -> Self {
        self.state.constraints.write().push((rule, 0));
        self
    }

    pub fn add_subnet(self, region: impl Into<String>, subnet: SubnetInfo) -> Self {
        self.state.subnets.write().push(RegionalSubnet {
            region: region.into(),
            subnet,
        });
        self
    }

    pub fn add_security_group(self, region: impl Into<String>, group: SecurityGroupInfo) -> Self {
        self.state.security_groups.write().push(RegionalSecurityGroup {
            region: region.into(),
            group,
        });
        self
    }

    /// Scripts are matched in insertion order; the first match wins.
    pub fn add_stack_script(self, script: StackScript) -> Self {
        self.state.scripts.write().push(script);
        self
    }

    pub fn add_template(self, key: impl Into<String>, body: impl Into<String>) -> Self {
        self.state.templates.write().insert(key.into(), body.into());
        self
    }

    /// Register a stack that exists before the run started.
    pub fn add_existing_stack(self, summary: StackSummary) -> Self {
        let mut script = self.script_for(&summary.region, &summary.stack_name);
        if !summary.status.is_empty() {
            script.statuses = vec![summary.status.clone()];
        }
        self.state.stacks.write().push(MockStack {
            summary,
            script,
            cursor: 0,
            deleting: false,
        });
        self
    }

    /// Make `connect` fail for a region.
    pub fn fail_connect(self, region: impl Into<String>) -> Self {
        self.state.unreachable_regions.write().push(region.into());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.state.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.state.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.state.captured_calls.read().len()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state
            .captured_calls
            .read()
            .iter()
            .any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.state
            .captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Current view of every stack the mock knows about.
    pub fn stacks(&self) -> Vec<StackSummary> {
        self.state
            .stacks
            .read()
            .iter()
            .map(|s| s.summary.clone())
            .collect()
    }

    fn template_source(&self, template: &TemplateRef) -> Option<String> {
        if let Some(body) = &template.template_body {
            return Some(body.clone());
        }
        let templates = self.state.templates.read();
        template
            .template_id
            .as_ref()
            .or(template.template_url.as_ref())
            .and_then(|k| templates.get(k).cloned())
    }

    fn script_for(&self, region: &str, stack_name: &str) -> StackScript {
        self.state
            .scripts
            .read()
            .iter()
            .find(|s| s.matches(region, stack_name))
            .cloned()
            .unwrap_or_default()
    }
}

impl CloudConnector for MockCloud {
    fn connect(&self, region: &str, _credential: &Credential) -> CloudResult<Arc<dyn CloudFacade>> {
        if self.state.unreachable_regions.read().iter().any(|r| r == region) {
            return Err(CloudError::Credential(format!(
                "no endpoint available for region {}",
                region
            )));
        }
        Ok(Arc::new(MockCloudClient {
            cloud: self.clone(),
            region: region.to_string(),
        }))
    }
}

/// Region-bound client handed out by [`MockCloud`].
pub struct MockCloudClient {
    cloud: MockCloud,
    region: String,
}

impl MockCloudClient {
    fn record(&self, method: &str, target: Option<&str>, parameters: Option<&Parameters>) {
        self.cloud.state.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            region: self.region.clone(),
            target: target.map(String::from),
            parameters: parameters.cloned(),
        });
    }
}

#[async_trait]
impl CloudFacade for MockCloudClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create_stack(&self, request: &CreateStackRequest) -> CloudResult<String> {
        self.record("create_stack", Some(&request.stack_name), Some(&request.parameters));

        let script = self.cloud.script_for(&self.region, &request.stack_name);
        if let Some(err) = &script.create_error {
            return Err(err.to_error());
        }

        let n = self.cloud.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stack_id = format!("stack-{}-{:04}", self.region, n);
        self.cloud.state.stacks.write().push(MockStack {
            summary: StackSummary {
                stack_id: stack_id.clone(),
                stack_name: request.stack_name.clone(),
                region: self.region.clone(),
                status: "CREATE_IN_PROGRESS".to_string(),
                tags: request.tags.clone(),
            },
            script,
            cursor: 0,
            deleting: false,
        });
        Ok(stack_id)
    }

    /// Previews fail the way creation would for the matching script.
    async fn preview_stack(&self, request: &PreviewStackRequest) -> CloudResult<Vec<PreviewResource>> {
        self.record("preview_stack", Some(&request.stack_name), Some(&request.parameters));

        let script = self.cloud.script_for(&self.region, &request.stack_name);
        if let Some(err) = &script.create_error {
            return Err(err.to_error());
        }
        let body = self
            .cloud
            .template_source(&request.template)
            .ok_or_else(|| CloudError::service("InvalidTemplate", "template not found"))?;
        preview_resources(&body, &request.parameters)
    }

    async fn delete_stack(&self, stack_id: &str) -> CloudResult<()> {
        self.record("delete_stack", Some(stack_id), None);

        let mut stacks = self.cloud.state.stacks.write();
        let stack = stacks
            .iter_mut()
            .find(|s| s.summary.stack_id == stack_id)
            .ok_or_else(|| CloudError::NotFound(stack_id.to_string()))?;
        if let Some(err) = &stack.script.delete_error {
            return Err(err.to_error());
        }
        stack.deleting = true;
        stack.cursor = 0;
        Ok(())
    }

    async fn describe_stack(&self, stack_id: &str) -> CloudResult<Option<StackDescription>> {
        self.record("describe_stack", Some(stack_id), None);

        let mut stacks = self.cloud.state.stacks.write();
        let Some(stack) = stacks.iter_mut().find(|s| s.summary.stack_id == stack_id) else {
            return Ok(None);
        };
        let status = stack.advance();
        Ok(Some(StackDescription {
            stack_id: stack.summary.stack_id.clone(),
            stack_name: stack.summary.stack_name.clone(),
            region: stack.summary.region.clone(),
            status,
            status_reason: stack.script.status_reason.clone(),
        }))
    }

    async fn list_stacks(
        &self,
        tags: &Tags,
        stack_id: Option<&str>,
        page: PageRequest,
    ) -> CloudResult<Page<StackSummary>> {
        self.record("list_stacks", stack_id, None);

        let matching: Vec<StackSummary> = self
            .cloud
            .state
            .stacks
            .read()
            .iter()
            .map(|s| &s.summary)
            .filter(|s| s.region == self.region && s.status != "DELETE_COMPLETE")
            .filter(|s| stack_id.map_or(true, |id| s.stack_id == id))
            .filter(|s| tags.iter().all(|(k, v)| s.tags.get(k) == Some(v)))
            .cloned()
            .collect();
        Ok(Page::slice(&matching, page))
    }

    async fn list_stack_events(
        &self,
        stack_id: &str,
        page: PageRequest,
    ) -> CloudResult<Page<StackEvent>> {
        self.record("list_stack_events", Some(stack_id), None);

        let stacks = self.cloud.state.stacks.read();
        let stack = stacks
            .iter()
            .find(|s| s.summary.stack_id == stack_id)
            .ok_or_else(|| CloudError::NotFound(stack_id.to_string()))?;
        Ok(Page::slice(&stack.script.events, page))
    }

    async fn list_stack_resources(&self, stack_id: &str) -> CloudResult<Vec<StackResource>> {
        self.record("list_stack_resources", Some(stack_id), None);

        let stacks = self.cloud.state.stacks.read();
        let stack = stacks
            .iter()
            .find(|s| s.summary.stack_id == stack_id)
            .ok_or_else(|| CloudError::NotFound(stack_id.to_string()))?;
        Ok(stack.script.resources.clone())
    }

    async fn get_parameter_constraints(
        &self,
        query: &ConstraintQuery,
    ) -> CloudResult<ConstraintQueryResult> {
        self.record("get_parameter_constraints", query.key(), Some(&query.parameters));

        let mut rules = self.cloud.state.constraints.write();
        let hit = rules.iter_mut().find(|(rule, used)| {
            rule.times.map_or(true, |limit| *used < limit) && rule.matches(&self.region, query)
        });
        match hit {
            Some((rule, used)) => {
                *used += 1;
                Ok(rule.to_result())
            }
            None => Ok(ConstraintQueryResult::not_supported("no constraint rule")),
        }
    }

    async fn get_template_body(&self, template: &TemplateRef) -> CloudResult<Option<String>> {
        self.record("get_template_body", None, None);
        Ok(self.cloud.template_source(template))
    }

    async fn list_subnets(&self, zone_id: Option<&str>) -> CloudResult<Vec<SubnetInfo>> {
        self.record("list_subnets", zone_id, None);

        Ok(self
            .cloud
            .state
            .subnets
            .read()
            .iter()
            .filter(|s| s.region == self.region)
            .filter(|s| zone_id.map_or(true, |z| s.subnet.zone_id == z))
            .map(|s| s.subnet.clone())
            .collect())
    }

    async fn list_security_groups(
        &self,
        vpc_id: &str,
        page: PageRequest,
    ) -> CloudResult<Page<SecurityGroupInfo>> {
        self.record("list_security_groups", Some(vpc_id), None);

        let groups: Vec<SecurityGroupInfo> = self
            .cloud
            .state
            .security_groups
            .read()
            .iter()
            .filter(|g| g.region == self.region && g.group.vpc_id == vpc_id)
            .map(|g| g.group.clone())
            .collect();
        Ok(Page::slice(&groups, page))
    }

    async fn list_regions(&self) -> CloudResult<Vec<String>> {
        self.record("list_regions", None, None);
        Ok(self.cloud.state.regions.read().clone())
    }
}

/// Resources declared by a template, with `Ref`s to parameters filled in.
fn preview_resources(body: &str, parameters: &Parameters) -> CloudResult<Vec<PreviewResource>> {
    let template: serde_yaml::Value = serde_yaml::from_str(body)
        .map_err(|e| CloudError::service("InvalidTemplate", e.to_string()))?;
    let Some(resources) = template.get("Resources").and_then(serde_yaml::Value::as_mapping) else {
        return Ok(Vec::new());
    };

    let mut preview = Vec::with_capacity(resources.len());
    for (logical_id, resource) in resources {
        let Some(logical_id) = logical_id.as_str() else {
            continue;
        };
        let resource_type = resource
            .get("Type")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default();
        let properties = match resource.get("Properties") {
            Some(props) => preview_value(props, parameters)?,
            None => json!({}),
        };
        preview.push(PreviewResource {
            logical_id: logical_id.to_string(),
            resource_type: resource_type.to_string(),
            properties,
        });
    }
    Ok(preview)
}

fn preview_value(value: &serde_yaml::Value, parameters: &Parameters) -> CloudResult<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Tagged(tagged) if tagged.tag == "Ref" => reference(&tagged.value, parameters),
        Yaml::Tagged(tagged) => preview_value(&tagged.value, parameters)?,
        Yaml::Mapping(map) => match map.get("Ref") {
            Some(name) if map.len() == 1 => reference(name, parameters),
            _ => {
                let mut object = serde_json::Map::new();
                for (k, v) in map {
                    if let Some(k) = k.as_str() {
                        object.insert(k.to_string(), preview_value(v, parameters)?);
                    }
                }
                Value::Object(object)
            }
        },
        Yaml::Sequence(items) => Value::Array(
            items
                .iter()
                .map(|v| preview_value(v, parameters))
                .collect::<CloudResult<_>>()?,
        ),
        scalar => serde_json::to_value(scalar)?,
    })
}

fn reference(name: &serde_yaml::Value, parameters: &Parameters) -> Value {
    let name = name.as_str().unwrap_or_default();
    parameters
        .get(name)
        .cloned()
        .unwrap_or_else(|| json!({ "Ref": name }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(cloud: &MockCloud, region: &str) -> Arc<dyn CloudFacade> {
        cloud.connect(region, &Credential::default()).unwrap()
    }

    fn query(key: &str, parameters: Parameters) -> ConstraintQuery {
        ConstraintQuery {
            template: TemplateRef::from_body("{}"),
            parameters,
            key_filter: vec![key.to_string()],
            parameters_order: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_constraint_rules_match_on_context() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::allow("Type", vec![]).when("Zone", "z-a"))
            .add_constraint(ConstraintRule::allow("Type", vec![json!("t1")]).when("Zone", "z-b"));
        let facade = client(&cloud, "r1");

        let mut params = Parameters::new();
        params.insert("Zone".into(), json!("z-b"));
        let result = facade.get_parameter_constraints(&query("Type", params)).await.unwrap();
        assert_eq!(result.allowed_values, vec![json!("t1")]);

        let result = facade
            .get_parameter_constraints(&query("Other", Parameters::new()))
            .await
            .unwrap();
        assert_eq!(result.behavior, ConstraintBehavior::NotSupported);
    }

    #[tokio::test]
    async fn test_limited_rule_falls_through() {
        let cloud = MockCloud::new()
            .add_constraint(ConstraintRule::timeout("Zone", 1))
            .add_constraint(ConstraintRule::allow("Zone", vec![json!("z-a")]));
        let facade = client(&cloud, "r1");

        let first = facade
            .get_parameter_constraints(&query("Zone", Parameters::new()))
            .await
            .unwrap();
        assert!(first.is_timeout());

        let second = facade
            .get_parameter_constraints(&query("Zone", Parameters::new()))
            .await
            .unwrap();
        assert_eq!(second.allowed_values, vec![json!("z-a")]);
    }

    #[tokio::test]
    async fn test_stack_script_progression() {
        let cloud = MockCloud::new().add_stack_script(
            StackScript::new()
                .in_region("r1")
                .statuses(&["CREATE_IN_PROGRESS", "CREATE_COMPLETE"]),
        );
        let facade = client(&cloud, "r1");
        let request = CreateStackRequest {
            stack_name: "iact3-demo-r1-abcd1234".into(),
            template: TemplateRef::from_body("{}"),
            parameters: Parameters::new(),
            tags: Tags::new(),
            client_token: "token".into(),
            timeout_in_minutes: 60,
            disable_rollback: true,
            ram_role_name: None,
        };

        let id = facade.create_stack(&request).await.unwrap();
        let first = facade.describe_stack(&id).await.unwrap().unwrap();
        assert_eq!(first.status, "CREATE_IN_PROGRESS");
        let second = facade.describe_stack(&id).await.unwrap().unwrap();
        assert_eq!(second.status, "CREATE_COMPLETE");
        let third = facade.describe_stack(&id).await.unwrap().unwrap();
        assert_eq!(third.status, "CREATE_COMPLETE");

        facade.delete_stack(&id).await.unwrap();
        let deleted = facade.describe_stack(&id).await.unwrap().unwrap();
        assert_eq!(deleted.status, "DELETE_COMPLETE");

        assert!(facade.delete_stack("missing").await.unwrap_err().is_not_found());
        assert_eq!(cloud.get_method_calls("describe_stack").len(), 4);
    }

    #[tokio::test]
    async fn test_scripted_create_failure() {
        let cloud = MockCloud::new()
            .add_stack_script(StackScript::new().in_region("r2").fail_create("QuotaExceeded", "no quota"));
        let facade = client(&cloud, "r2");
        let request = CreateStackRequest {
            stack_name: "iact3-demo-r2-abcd1234".into(),
            template: TemplateRef::from_body("{}"),
            parameters: Parameters::new(),
            tags: Tags::new(),
            client_token: "token".into(),
            timeout_in_minutes: 60,
            disable_rollback: true,
            ram_role_name: None,
        };

        let err = facade.create_stack(&request).await.unwrap_err();
        assert_eq!(err.code(), "QuotaExceeded");
        assert!(cloud.stacks().is_empty());
    }

    #[tokio::test]
    async fn test_preview_lists_template_resources() {
        let cloud = MockCloud::new()
            .add_stack_script(StackScript::new().named("broken").fail_create("StackValidationFailed", "bad property"));
        let facade = client(&cloud, "r1");
        let body = r#"
Resources:
  EcsInstance:
    Type: ALIYUN::ECS::Instance
    Properties:
      ZoneId: !Ref ZoneId
      VpcId: { Ref: VpcId }
      ImageId: centos_7
  Eip:
    Type: ALIYUN::VPC::EIP
"#;
        let mut parameters = Parameters::new();
        parameters.insert("ZoneId".into(), json!("cn-hangzhou-h"));
        let mut request = PreviewStackRequest {
            stack_name: "iact3-ecs-r1-00000000".into(),
            template: TemplateRef::from_body(body),
            parameters,
        };

        let resources = facade.preview_stack(&request).await.unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].logical_id, "EcsInstance");
        assert_eq!(resources[0].resource_type, "ALIYUN::ECS::Instance");
        assert_eq!(
            resources[0].properties,
            json!({"ZoneId": "cn-hangzhou-h", "VpcId": {"Ref": "VpcId"}, "ImageId": "centos_7"})
        );
        assert_eq!(resources[1].properties, json!({}));
        assert!(cloud.stacks().is_empty());

        request.stack_name = "iact3-broken-r1-00000000".into();
        let err = facade.preview_stack(&request).await.unwrap_err();
        assert_eq!(err.code(), "StackValidationFailed");
    }

    #[test]
    fn test_fail_connect() {
        let cloud = MockCloud::new().fail_connect("r9");
        assert!(cloud.connect("r9", &Credential::default()).is_err());
        assert!(cloud.connect("r1", &Credential::default()).is_ok());
    }

    #[test]
    fn test_fixture_parsing() {
        let yaml = r#"
regions: [cn-hangzhou, cn-beijing]
constraints:
  - key: ZoneId
    allowed_values: [cn-hangzhou-h, cn-hangzhou-i]
  - key: InstanceType
    when: { ZoneId: cn-hangzhou-h }
    allowed_values: []
subnets:
  - region: cn-hangzhou
    vpc_id: vpc-1
    subnet_id: vsw-1
    zone_id: cn-hangzhou-i
    available_ip_count: 200
stacks:
  - region: cn-beijing
    create_error: { code: InvalidTemplate, message: bad template }
"#;
        let fixture: MockFixture = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fixture.regions.len(), 2);
        assert_eq!(fixture.constraints.len(), 2);
        assert_eq!(fixture.subnets[0].subnet.subnet_id, "vsw-1");
        assert_eq!(fixture.stacks[0].statuses, default_create_statuses());

        let cloud = MockCloud::from_fixture(fixture);
        assert_eq!(cloud.state.constraints.read().len(), 2);
    }
}
