//! Records exchanged with the cloud service facade.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template parameter mapping, kept in insertion order.
pub type Parameters = serde_json::Map<String, Value>;

/// Stack tag set.
pub type Tags = BTreeMap<String, String>;

/// Where a template body comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRef {
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub template_id: Option<String>,
    pub template_version: Option<String>,
}

impl TemplateRef {
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            template_body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            template_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_id(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            template_id: Some(id.into()),
            template_version: version,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.template_body.is_none() && self.template_url.is_none() && self.template_id.is_none()
    }

    /// Short description used in log lines.
    pub fn describe(&self) -> String {
        if let Some(id) = &self.template_id {
            match &self.template_version {
                Some(v) => format!("template {} ({})", id, v),
                None => format!("template {}", id),
            }
        } else if let Some(url) = &self.template_url {
            format!("template {}", url)
        } else if self.template_body.is_some() {
            "inline template".to_string()
        } else {
            "empty template".to_string()
        }
    }
}

/// Reference to the credential profile used for a region client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credential {
    /// Profile name inside the credential file.
    pub name: Option<String>,
    /// Credential file location.
    pub location: Option<PathBuf>,
}

/// Stack creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStackRequest {
    pub stack_name: String,
    pub template: TemplateRef,
    pub parameters: Parameters,
    pub tags: Tags,
    pub client_token: String,
    pub timeout_in_minutes: u32,
    pub disable_rollback: bool,
    #[serde(default)]
    pub ram_role_name: Option<String>,
}

/// Dry-run request: what a creation would produce, without creating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewStackRequest {
    pub stack_name: String,
    pub template: TemplateRef,
    pub parameters: Parameters,
}

/// A resource a previewed stack would create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResource {
    pub logical_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub properties: Value,
}

/// Point-in-time description of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub region: String,
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
}

/// Stack entry returned by tag listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSummary {
    pub stack_id: String,
    pub stack_name: String,
    pub region: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Tags,
}

/// One entry of a stack's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEvent {
    pub event_id: String,
    pub stack_name: String,
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    #[serde(default)]
    pub status_reason: String,
    #[serde(default)]
    pub physical_id: Option<String>,
    pub timestamp: String,
}

/// A resource currently owned by a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackResource {
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    #[serde(default)]
    pub physical_id: String,
    #[serde(default)]
    pub status_reason: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// How the constraint API evaluated a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstraintBehavior {
    #[default]
    Supported,
    NotSupported,
    QueryError,
}

/// Parameter constraint lookup for one key given a partial assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintQuery {
    pub template: TemplateRef,
    pub parameters: Parameters,
    pub key_filter: Vec<String>,
    pub parameters_order: Vec<String>,
}

impl ConstraintQuery {
    /// The single key this query is filtered to.
    pub fn key(&self) -> Option<&str> {
        self.key_filter.first().map(String::as_str)
    }
}

/// Allowed-value domain reported for a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintQueryResult {
    pub behavior: ConstraintBehavior,
    #[serde(default)]
    pub allowed_values: Vec<Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ConstraintQueryResult {
    pub fn supported(values: Vec<Value>) -> Self {
        Self {
            behavior: ConstraintBehavior::Supported,
            allowed_values: values,
            reason: None,
        }
    }

    pub fn not_supported(reason: impl Into<String>) -> Self {
        Self {
            behavior: ConstraintBehavior::NotSupported,
            allowed_values: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn query_error(reason: impl Into<String>) -> Self {
        Self {
            behavior: ConstraintBehavior::QueryError,
            allowed_values: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// Transient timeout worth retrying.
    pub fn is_timeout(&self) -> bool {
        self.behavior == ConstraintBehavior::QueryError
            && self
                .reason
                .as_deref()
                .map(|r| r.to_lowercase().contains("timeout"))
                .unwrap_or(false)
    }
}

/// Subnet as reported by the network lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub vpc_id: String,
    pub subnet_id: String,
    pub zone_id: String,
    pub available_ip_count: u64,
}

/// Security group as reported by the compute lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
    pub security_group_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub service_managed: bool,
}

/// One page of a paginated listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Offset of the first item on this page.
    pub fn offset(&self) -> usize {
        (self.number.saturating_sub(1) as usize) * self.size as usize
    }
}

/// One page of results plus the total item count across pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: usize) -> Self {
        Self { items, total_count }
    }

    /// Number of pages needed for `total_count` at the given page size.
    pub fn total_pages(&self, page_size: u32) -> u32 {
        if self.total_count == 0 || page_size == 0 {
            return 0;
        }
        ((self.total_count - 1) / page_size as usize + 1) as u32
    }

    /// Slice a full listing into the requested page.
    pub fn slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let items = all
            .iter()
            .skip(request.offset())
            .take(request.size as usize)
            .cloned()
            .collect();
        Self::new(items, all.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeout_detection() {
        assert!(ConstraintQueryResult::query_error("request timeout").is_timeout());
        assert!(ConstraintQueryResult::query_error("Timeout while querying").is_timeout());
        assert!(!ConstraintQueryResult::query_error("permission denied").is_timeout());
        assert!(!ConstraintQueryResult::supported(vec![json!("a")]).is_timeout());
    }

    #[test]
    fn test_page_math() {
        let page: Page<u32> = Page::new(vec![], 0);
        assert_eq!(page.total_pages(50), 0);

        let page: Page<u32> = Page::new(vec![], 50);
        assert_eq!(page.total_pages(50), 1);

        let page: Page<u32> = Page::new(vec![], 51);
        assert_eq!(page.total_pages(50), 2);
    }

    #[test]
    fn test_page_slice() {
        let all: Vec<u32> = (0..7).collect();
        let second = Page::slice(&all, PageRequest::new(2, 3));
        assert_eq!(second.items, vec![3, 4, 5]);
        assert_eq!(second.total_count, 7);

        let last = Page::slice(&all, PageRequest::new(3, 3));
        assert_eq!(last.items, vec![6]);
    }

    #[test]
    fn test_template_ref_describe() {
        assert_eq!(TemplateRef::from_body("{}").describe(), "inline template");
        assert_eq!(
            TemplateRef::from_id("tpl-1", Some("v2".into())).describe(),
            "template tpl-1 (v2)"
        );
        assert!(TemplateRef::default().is_empty());
    }
}
