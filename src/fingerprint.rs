use crate::Result;

/// Cache key for one (plugin, options) pair.
///
/// `serde_json` maps iterate in sorted key order, so semantically equal
/// option objects serialize to the same key regardless of how they were
/// built.
pub(crate) fn instance_key(id: &str, options: &serde_json::Value) -> Result<String> {
    let encoded = serde_json::to_string(options)?;
    Ok(format!("{id}::{encoded}"))
}
