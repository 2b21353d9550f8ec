//! Cloud service facade traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::models::{
    ConstraintQuery, ConstraintQueryResult, CreateStackRequest, Credential, Page, PageRequest,
    PreviewResource, PreviewStackRequest, SecurityGroupInfo, StackDescription, StackEvent,
    StackResource, StackSummary, SubnetInfo, Tags, TemplateRef,
};

/// Region-bound client for the orchestration, network and compute APIs.
///
/// Implementations own request construction, signing and transport retries.
/// Listing calls expose one page at a time; callers combine pages with
/// [`crate::paging::fetch_all`].
#[async_trait]
pub trait CloudFacade: Send + Sync {
    /// Region this client is bound to.
    fn region(&self) -> &str;

    /// Create a stack and return its cloud-assigned identifier.
    async fn create_stack(&self, request: &CreateStackRequest) -> CloudResult<String>;

    /// Resources a creation with this request would produce. Nothing is created.
    async fn preview_stack(&self, request: &PreviewStackRequest) -> CloudResult<Vec<PreviewResource>>;

    /// Delete a stack. Unknown identifiers yield [`crate::CloudError::NotFound`].
    async fn delete_stack(&self, stack_id: &str) -> CloudResult<()>;

    /// Describe a stack, `None` if it no longer exists.
    async fn describe_stack(&self, stack_id: &str) -> CloudResult<Option<StackDescription>>;

    /// List stacks carrying every given tag.
    async fn list_stacks(
        &self,
        tags: &Tags,
        stack_id: Option<&str>,
        page: PageRequest,
    ) -> CloudResult<Page<StackSummary>>;

    async fn list_stack_events(
        &self,
        stack_id: &str,
        page: PageRequest,
    ) -> CloudResult<Page<StackEvent>>;

    async fn list_stack_resources(&self, stack_id: &str) -> CloudResult<Vec<StackResource>>;

    /// Query the allowed-value domain of the filtered key.
    async fn get_parameter_constraints(
        &self,
        query: &ConstraintQuery,
    ) -> CloudResult<ConstraintQueryResult>;

    /// Fetch a template body held by the service (template id, object storage url).
    async fn get_template_body(&self, template: &TemplateRef) -> CloudResult<Option<String>>;

    /// Subnets in this region, optionally restricted to a zone.
    async fn list_subnets(&self, zone_id: Option<&str>) -> CloudResult<Vec<SubnetInfo>>;

    async fn list_security_groups(
        &self,
        vpc_id: &str,
        page: PageRequest,
    ) -> CloudResult<Page<SecurityGroupInfo>>;

    /// Every region the service is available in.
    async fn list_regions(&self) -> CloudResult<Vec<String>>;
}

/// Builds region clients from a credential reference.
pub trait CloudConnector: Send + Sync {
    fn connect(&self, region: &str, credential: &Credential) -> CloudResult<Arc<dyn CloudFacade>>;
}
