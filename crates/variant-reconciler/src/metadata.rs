//! Annotation payload parsing
//!
//! Workloads carry JSON payloads in annotations: alerting/recording rules,
//! autoscaler rules, and extra relabel configs. Parsing applies the
//! documented defaults; a malformed payload is an annotation error the
//! caller treats as a per-workload degenerate.

use crate::autoscaler::Autoscaler;
use variant_cf::Metadata;
use variant_core::{labels, Error, Result};
use variant_promcfg::{RelabelConfig, RuleNode};

/// Parse the rule nodes attached to a workload.
///
/// The base `prometheus.rules.json` annotation must decode as an array if
/// present; indexed `prometheus.rules.{n|name}.json` entries are decoded
/// individually and malformed ones are skipped.
pub fn parse_rules(metadata: &Metadata) -> Result<Vec<RuleNode>> {
    let mut rules: Vec<RuleNode> = Vec::new();

    if let Some(raw) = metadata.annotation(labels::ANNOTATION_RULES_JSON) {
        rules = serde_json::from_str(raw)
            .map_err(|e| Error::annotation(format!("decoding rules JSON: {}", e)))?;
    }

    for (key, value) in &metadata.annotations {
        if !labels::is_indexed_rules_annotation(key) {
            continue;
        }
        let Some(raw) = value.as_deref() else { continue };
        match serde_json::from_str::<RuleNode>(raw) {
            Ok(rule) => rules.push(rule),
            Err(_) => continue,
        }
    }

    Ok(rules)
}

/// Parse the autoscaler rules attached to a workload, injecting the
/// workload GUID and applying defaults and clamps.
pub fn parse_autoscalers(metadata: &Metadata, app_guid: &str) -> Result<Vec<Autoscaler>> {
    let raw = metadata
        .annotation(labels::ANNOTATION_AUTOSCALER_JSON)
        .ok_or_else(|| {
            Error::annotation(format!(
                "missing annotation '{}'",
                labels::ANNOTATION_AUTOSCALER_JSON
            ))
        })?;

    let mut scalers: Vec<Autoscaler> = serde_json::from_str(raw)
        .map_err(|e| Error::annotation(format!("decoding scaler JSON: {}", e)))?;

    for scaler in scalers.iter_mut() {
        scaler.apply_defaults();
        scaler.guid = app_guid.to_string();
    }
    Ok(scalers)
}

/// Parse the extra relabel configs attached to a workload, if any.
pub fn parse_relabel_configs(metadata: &Metadata) -> Result<Vec<RelabelConfig>> {
    match metadata.annotation(labels::ANNOTATION_RELABEL_CONFIGS) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::annotation(format!("decoding relabel configs: {}", e))),
        None => Ok(Vec::new()),
    }
}
