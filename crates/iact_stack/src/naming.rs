//! Stack names, idempotency tokens and system tags.

use chrono::Utc;
use iact_cloud::Tags;
use iact_config::PRODUCT_PREFIX;
use uuid::Uuid;

pub const TAG_RUN_ID: &str = "iact3-id";
pub const TAG_PROJECT_NAME: &str = "iact3-project-name";
pub const TAG_TEST_NAME: &str = "iact3-test-name";
pub const TAG_CREATED_BY: &str = "CreatedBy";

/// Longest client token the service accepts.
pub const CLIENT_TOKEN_MAX_LEN: usize = 64;

/// Unique stack name: `iact3-{test}-{region}-{8 hex}`.
pub fn stack_name(test_name: &str, region: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}-{}", PRODUCT_PREFIX, test_name, region, &suffix[..8])
}

/// Idempotency token scoped to one run and one test.
pub fn client_token(run_id: &Uuid, test_name: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let token = format!("{}_{:011x}_{}", run_id.simple(), millis, test_name);
    token.chars().take(CLIENT_TOKEN_MAX_LEN).collect()
}

/// The tag every stack launched by this tool carries.
pub fn created_by_tag() -> (String, String) {
    (TAG_CREATED_BY.to_string(), PRODUCT_PREFIX.to_string())
}

/// Tags shared by every stack of one run.
pub fn system_tags(run_id: &Uuid, project_name: &str) -> Tags {
    let mut tags = Tags::new();
    tags.insert(TAG_RUN_ID.to_string(), run_id.simple().to_string());
    tags.insert(TAG_PROJECT_NAME.to_string(), project_name.to_string());
    let (key, value) = created_by_tag();
    tags.insert(key, value);
    tags
}
