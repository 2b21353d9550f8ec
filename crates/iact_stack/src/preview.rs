//! Dry-run previews of the stacks a run would create.

use iact_cloud::{CloudConnector, PreviewResource, PreviewStackRequest};
use iact_config::{SpecError, TestSpecification};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::naming;

/// What one (test, region) would create, or why it cannot be previewed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackPreview {
    pub test_name: String,
    pub region: String,
    pub stack_name: String,
    pub resources: Vec<PreviewResource>,
    pub error: Option<SpecError>,
}

impl StackPreview {
    fn new(spec: &TestSpecification) -> Self {
        Self {
            test_name: spec.test_name.clone(),
            region: spec.region.clone(),
            stack_name: naming::stack_name(&spec.test_name, &spec.region),
            resources: Vec::new(),
            error: None,
        }
    }

    fn failed(mut self, error: SpecError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Preview one specification. Failures are recorded on the preview.
pub(crate) async fn preview_stack(
    connector: &dyn CloudConnector,
    spec: &TestSpecification,
) -> StackPreview {
    let preview = StackPreview::new(spec);
    if let Some(err) = &spec.error {
        warn!(test = %spec.test_name, region = %spec.region, "Skipping preview: {}", err);
        return preview.failed(err.clone());
    }

    let facade = match connector.connect(&spec.region, &spec.credential) {
        Ok(facade) => facade,
        Err(e) => {
            error!(test = %spec.test_name, region = %spec.region, "Failed to connect: {}", e);
            return preview.failed(SpecError::new(e.code(), e.message()));
        }
    };

    let request = PreviewStackRequest {
        stack_name: preview.stack_name.clone(),
        template: spec.template.clone(),
        parameters: spec.parameters.clone(),
    };
    match facade.preview_stack(&request).await {
        Ok(resources) => {
            debug!(test = %spec.test_name, region = %spec.region, count = resources.len(), "Previewed stack");
            StackPreview { resources, ..preview }
        }
        Err(e) => {
            error!(test = %spec.test_name, region = %spec.region, "Preview rejected: {}", e);
            preview.failed(SpecError::new(e.code(), e.message()))
        }
    }
}
