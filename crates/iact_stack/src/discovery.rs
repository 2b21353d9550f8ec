//! Finding stacks left by earlier runs and deleting them in batches.

use std::collections::HashMap;
use std::sync::Arc;

use iact_cloud::{
    fan_out, fetch_all, CloudConnector, CloudFacade, Credential, StackSummary, Tags,
    DEFAULT_PAGE_SIZE,
};
use iact_config::DEFAULT_REGION;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StackResult;
use crate::naming::{created_by_tag, TAG_PROJECT_NAME, TAG_RUN_ID, TAG_TEST_NAME};
use crate::progress::ProgressReporter;
use crate::stack::Stack;
use crate::stacker::Stacker;

/// Stacks deleted together before waiting for them to go away.
pub const CLEAN_BATCH_SIZE: usize = 10;

/// A discovered stack with its run tags pulled out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackListing {
    pub stack_id: String,
    pub stack_name: String,
    pub region: String,
    pub status: String,
    pub test_name: Option<String>,
    pub project_name: Option<String>,
    pub run_id: Option<String>,
}

impl From<&StackSummary> for StackListing {
    fn from(summary: &StackSummary) -> Self {
        Self {
            stack_id: summary.stack_id.clone(),
            stack_name: summary.stack_name.clone(),
            region: summary.region.clone(),
            status: summary.status.clone(),
            test_name: summary.tags.get(TAG_TEST_NAME).cloned(),
            project_name: summary.tags.get(TAG_PROJECT_NAME).cloned(),
            run_id: summary.tags.get(TAG_RUN_ID).cloned(),
        }
    }
}

/// The given regions, or every region the service offers when none are given.
pub async fn regions_or_all(
    connector: &dyn CloudConnector,
    credential: &Credential,
    regions: &[String],
) -> StackResult<Vec<String>> {
    if !regions.is_empty() {
        return Ok(regions.to_vec());
    }
    let facade = connector.connect(DEFAULT_REGION, credential)?;
    Ok(facade.list_regions().await?)
}

/// Stacks created by this tool that carry every given tag.
///
/// Regions are searched concurrently; any failing region fails the listing.
pub async fn discover_stacks(
    connector: &dyn CloudConnector,
    credential: &Credential,
    regions: &[String],
    tags: &Tags,
    stack_id: Option<&str>,
) -> StackResult<Vec<StackSummary>> {
    let regions = regions_or_all(connector, credential, regions).await?;

    let mut filter = tags.clone();
    let (key, value) = created_by_tag();
    filter.insert(key, value);
    let filter = &filter;

    let per_region = fan_out(regions, |region| async move {
        let facade = connector.connect(&region, credential)?;
        let stacks = fetch_all(DEFAULT_PAGE_SIZE, |page| {
            facade.list_stacks(filter, stack_id, page)
        })
        .await?;
        debug!(region = %region, count = stacks.len(), "Listed stacks");
        StackResult::Ok(stacks)
    })
    .await;

    let mut found = Vec::new();
    for stacks in per_region {
        found.extend(stacks?);
    }
    Ok(found)
}

/// Delete discovered stacks in batches, waiting for each batch to settle.
/// Returns how many stacks were processed, or the first deletion error once
/// every batch has been attempted.
pub async fn clean_stacks(
    connector: Arc<dyn CloudConnector>,
    credential: &Credential,
    summaries: Vec<StackSummary>,
    reporter: &ProgressReporter,
) -> StackResult<usize> {
    let mut clients: HashMap<String, Arc<dyn CloudFacade>> = HashMap::new();
    let mut processed = 0;
    let mut first_error = None;

    for batch in summaries.chunks(CLEAN_BATCH_SIZE) {
        let mut stacks = Vec::with_capacity(batch.len());
        for summary in batch {
            let facade = match clients.get(&summary.region) {
                Some(facade) => Arc::clone(facade),
                None => {
                    let facade = connector.connect(&summary.region, credential)?;
                    clients.insert(summary.region.clone(), Arc::clone(&facade));
                    facade
                }
            };
            stacks.push(Arc::new(Stack::from_summary(summary.clone(), facade)));
        }

        info!(count = stacks.len(), "Deleting stacks");
        let stacker = Stacker::from_stacks(Arc::clone(&connector), stacks);
        if let Err(e) = stacker.delete_all(None).await {
            first_error.get_or_insert(e);
        }
        reporter.watch(&stacker).await;
        processed += batch.len();
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(processed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::MockCloud;

    fn summary(id: &str, region: &str, project: &str) -> StackSummary {
        let mut tags = Tags::new();
        tags.insert("CreatedBy".into(), "iact3".into());
        tags.insert(TAG_PROJECT_NAME.into(), project.into());
        tags.insert(TAG_TEST_NAME.into(), "default".into());
        StackSummary {
            stack_id: id.into(),
            stack_name: format!("iact3-default-{}-{}", region, id),
            region: region.into(),
            status: "CREATE_COMPLETE".into(),
            tags,
        }
    }

    #[tokio::test]
    async fn test_discover_across_regions() {
        let cloud = MockCloud::new()
            .with_regions(vec!["r1".into(), "r2".into()])
            .add_existing_stack(summary("s1", "r1", "demo"))
            .add_existing_stack(summary("s2", "r2", "demo"))
            .add_existing_stack(summary("s3", "r2", "other"));

        let mut tags = Tags::new();
        tags.insert(TAG_PROJECT_NAME.into(), "demo".into());
        let found = discover_stacks(&cloud, &Credential::default(), &[], &tags, None)
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|s| s.stack_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        let listing = StackListing::from(&found[0]);
        assert_eq!(listing.project_name.as_deref(), Some("demo"));
        assert_eq!(listing.test_name.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_discover_by_stack_id() {
        let cloud = MockCloud::new()
            .add_existing_stack(summary("s1", "r1", "demo"))
            .add_existing_stack(summary("s2", "r1", "demo"));

        let found = discover_stacks(
            &cloud,
            &Credential::default(),
            &["r1".to_string()],
            &Tags::new(),
            Some("s2"),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stack_id, "s2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_in_batches() {
        let mut cloud = MockCloud::new();
        for i in 0..12 {
            cloud = cloud.add_existing_stack(summary(&format!("s{}", i), "r1", "demo"));
        }
        let found = discover_stacks(&cloud, &Credential::default(), &["r1".to_string()], &Tags::new(), None)
            .await
            .unwrap();

        let processed = clean_stacks(
            Arc::new(cloud.clone()),
            &Credential::default(),
            found,
            &ProgressReporter::new(),
        )
        .await
        .unwrap();

        assert_eq!(processed, 12);
        assert_eq!(cloud.get_method_calls("delete_stack").len(), 12);
        let remaining = discover_stacks(&cloud, &Credential::default(), &["r1".to_string()], &Tags::new(), None)
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
