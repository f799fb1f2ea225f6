//! Per-build policy overrides carried in build annotations.
//!
//! Builds may ask for a longer (or shorter) timeout and for a dedicated
//! execution pool. Timeouts are always bounded by the operator maximum;
//! malformed annotations fall back to the defaults without failing the build.

use std::collections::BTreeMap;

use serde_json::Value;

/// Annotation holding the requested build timeout in minutes.
pub const TIMEOUT_ANNOTATION: &str = "screwdriver.cd/timeout";

/// Annotation holding the node label suffix selecting an execution pool.
pub const NODE_LABEL_ANNOTATION: &str = "screwdriver.cd/jenkinsNodeLabel";

/// Policy values resolved for a single build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedAnnotations {
    /// Build timeout in minutes, already clamped to the operator maximum.
    pub timeout_minutes: u64,
    /// Suffix appended to the default node label, when requested.
    pub node_label_suffix: Option<String>,
}

impl ResolvedAnnotations {
    /// Returns the node label the job should be pinned to.
    #[must_use]
    pub fn node_label(&self, default_label: &str) -> String {
        match &self.node_label_suffix {
            Some(suffix) => format!("{default_label}-{suffix}"),
            None => default_label.to_owned(),
        }
    }
}

/// Resolves timeout and node label overrides from `annotations`.
///
/// A requested timeout is clamped to `[0, max_timeout]`; a missing or
/// unparsable one yields `default_timeout`.
#[must_use]
pub fn resolve(
    default_timeout: u64,
    max_timeout: u64,
    annotations: &BTreeMap<String, Value>,
) -> ResolvedAnnotations {
    let timeout_minutes = annotations
        .get(TIMEOUT_ANNOTATION)
        .and_then(requested_minutes)
        .map_or(default_timeout, |requested| clamp(requested, max_timeout));

    let node_label_suffix = annotations
        .get(NODE_LABEL_ANNOTATION)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_owned);

    ResolvedAnnotations {
        timeout_minutes,
        node_label_suffix,
    }
}

fn requested_minutes(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|_| i64::MAX))
            .or_else(|| whole_minutes(&number.to_string())),
        Value::String(text) => whole_minutes(text),
        _ => None,
    }
}

/// Parses an integer, also accepting a zero fraction such as `500.0`.
fn whole_minutes(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(minutes) = trimmed.parse::<i64>() {
        return Some(minutes);
    }
    let (whole, fraction) = trimmed.split_once('.')?;
    if fraction.is_empty() || !fraction.chars().all(|digit| digit == '0') {
        return None;
    }
    whole.parse::<i64>().ok()
}

fn clamp(requested: i64, max_timeout: u64) -> u64 {
    u64::try_from(requested).map_or(0, |minutes| minutes.min(max_timeout))
}
