//! Placeholder values recognised in raw parameters.
//!
//! Both sentinels match case-insensitively and only as the whole value.

use iact_config::PRODUCT_PREFIX;
use serde_json::Value;

/// Sentinel asking the resolver to compute a value.
pub fn auto_sentinel() -> String {
    format!("$[{}-auto]", PRODUCT_PREFIX)
}

/// Sentinel replaced by the specification's region.
pub fn current_region_sentinel() -> String {
    format!("$[{}-current-region]", PRODUCT_PREFIX)
}

pub fn is_auto(value: &str) -> bool {
    value.eq_ignore_ascii_case(&auto_sentinel())
}

/// Both `-` and `_` are accepted between `current` and `region`.
pub fn is_current_region(value: &str) -> bool {
    let normalized = value.to_ascii_lowercase().replace("current_region", "current-region");
    normalized == current_region_sentinel()
}

pub fn is_auto_value(value: &Value) -> bool {
    value.as_str().map_or(false, is_auto)
}

/// Replace the auto sentinel inside `raw` with `resolved`.
pub fn substitute_auto(raw: &str, resolved: &str) -> String {
    if is_auto(raw) {
        resolved.to_string()
    } else {
        raw.to_string()
    }
}
