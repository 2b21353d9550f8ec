//! Parameter evaluation order and template retrieval.

use std::time::Duration;

use iact_cloud::{CloudFacade, Parameters, TemplateRef};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{ResolveError, ResolveResult};

/// Largest template body accepted from a remote location.
pub const TEMPLATE_MAX_SIZE: usize = 524_288;

/// Timeout for fetching a template over HTTP.
pub const TEMPLATE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const INTERFACE_METADATA: &str = "ALIYUN::ROS::Interface";

/// Fetch the template body a reference points at.
pub async fn template_body(
    facade: &dyn CloudFacade,
    http: &reqwest::Client,
    template: &TemplateRef,
) -> ResolveResult<String> {
    if let Some(body) = &template.template_body {
        return Ok(body.clone());
    }

    if let Some(id) = &template.template_id {
        return facade
            .get_template_body(template)
            .await
            .map_err(|e| ResolveError::Template(format!("{}: {}", id, e)))?
            .ok_or_else(|| ResolveError::Template(format!("template {} not found", id)));
    }

    let Some(url) = &template.template_url else {
        return Err(ResolveError::Template("no template configured".to_string()));
    };
    match url.split_once("://") {
        Some(("file", path)) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ResolveError::Template(format!("{}: {}", url, e))),
        Some(("http" | "https", _)) => fetch_http(http, url).await,
        Some(("oss", _)) => facade
            .get_template_body(template)
            .await?
            .ok_or_else(|| ResolveError::Template(format!("invalid oss url {}", url))),
        _ => Err(ResolveError::Template(format!("unsupported template url {}", url))),
    }
}

async fn fetch_http(http: &reqwest::Client, url: &str) -> ResolveResult<String> {
    debug!("Fetching template from {}", url);
    let mut response = http.get(url).send().await?.error_for_status()?;
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > TEMPLATE_MAX_SIZE {
            return Err(ResolveError::TemplateTooLarge {
                source_url: url.to_string(),
                max: TEMPLATE_MAX_SIZE,
            });
        }
    }
    String::from_utf8(body).map_err(|e| ResolveError::Template(format!("{}: {}", url, e)))
}

/// Keys listed in the template's parameter groups, in declaration order.
///
/// Short-form function tags (`!Ref`, `!GetAtt`, ...) are accepted anywhere
/// in the body.
pub fn metadata_order(body: &str) -> ResolveResult<Vec<String>> {
    let template: Value = serde_yaml::from_str(body)?;
    let groups = field(&template, "Metadata")
        .and_then(|m| field(m, INTERFACE_METADATA))
        .and_then(|i| field(i, "ParameterGroups"))
        .and_then(Value::as_sequence);

    let mut order = Vec::new();
    for group in groups.into_iter().flatten() {
        let params = field(group, "Parameters").and_then(Value::as_sequence);
        for key in params.into_iter().flatten().map(untagged).filter_map(Value::as_str) {
            if !order.iter().any(|k| k == key) {
                order.push(key.to_string());
            }
        }
    }
    Ok(order)
}

fn untagged(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untagged(&tagged.value),
        other => other,
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    untagged(value).get(key).map(untagged)
}

/// `primary` followed by every remaining key of `raw` in mapping order.
pub fn complete_order(primary: &[String], raw: &Parameters) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(raw.len());
    for key in primary {
        if !order.contains(key) {
            order.push(key.clone());
        }
    }
    for key in raw.keys() {
        if !order.contains(key) {
            order.push(key.clone());
        }
    }
    order
}

/// Evaluation order for a specification.
pub async fn evaluation_order(
    facade: &dyn CloudFacade,
    http: &reqwest::Client,
    template: &TemplateRef,
    declared: &[String],
    raw: &Parameters,
) -> ResolveResult<Vec<String>> {
    if !declared.is_empty() {
        return Ok(complete_order(declared, raw));
    }
    let body = template_body(facade, http, template).await?;
    let from_metadata = metadata_order(&body)?;
    debug!(keys = from_metadata.len(), "Derived parameter order from template metadata");
    Ok(complete_order(&from_metadata, raw))
}
