//! Config assembly, hashing, and reload
//!
//! Renders the per-workload rule files (sorted by name), hashes their bodies
//! together with the assembled main config, and short-circuits entirely when
//! the hash matches the previous tick. On a change the rule files and main
//! config are written and the metric server is asked to reload; the hash is
//! recorded before the write so a failed reload does not cause a rewrite
//! next tick.

use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use variant_cf::MetricQuerier;
use variant_core::{Error, Result};
use variant_metrics::VariantMetrics;
use variant_promcfg::{RuleGroup, RuleGroups, RuleNode};

/// Name of the single group every generated rule file carries
pub const RULE_GROUP_NAME: &str = "VariantGroup";

/// Lowercase hex MD5 of the assembled content.
pub fn config_hash(data: &str) -> String {
    hex::encode(Md5::digest(data.as_bytes()))
}

/// Render each rule file as a single-group document. The input map is
/// ordered by name, which fixes the hash input ordering.
pub fn render_rule_files(
    files: &BTreeMap<String, Vec<RuleNode>>,
) -> Result<Vec<(String, String)>> {
    files
        .iter()
        .map(|(name, rules)| {
            let content = RuleGroups {
                groups: vec![RuleGroup {
                    name: RULE_GROUP_NAME.to_string(),
                    interval: None,
                    rules: rules.clone(),
                }],
            };
            let body = serde_yaml::to_string(&content)?;
            Ok((name.clone(), body))
        })
        .collect()
}

/// Persist the assembled configuration and trigger a reload when its content
/// changed since the previous tick.
#[allow(clippy::too_many_arguments)]
pub async fn save_and_reload(
    config_path: &Path,
    new_config: &str,
    rule_files: &BTreeMap<String, Vec<RuleNode>>,
    last_hash: &mut Option<String>,
    reload_enabled: bool,
    querier: &dyn MetricQuerier,
    metrics: &VariantMetrics,
) -> Result<()> {
    let folder = config_path.parent().unwrap_or_else(|| Path::new("."));

    let rendered = render_rule_files(rule_files)?;
    let mut config_data = String::new();
    for (_, body) in &rendered {
        config_data.push_str(body);
    }
    config_data.push_str(new_config);

    let hash = config_hash(&config_data);
    if last_hash.as_deref() == Some(hash.as_str()) {
        debug!(%hash, "assembled config unchanged");
        metrics.inc_config_cache_hits();
        return Ok(());
    }
    *last_hash = Some(hash);

    for (name, body) in &rendered {
        let path = folder.join(name);
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(file = %path.display(), error = %e, "failed to write rule file");
        }
    }
    tokio::fs::write(config_path, new_config)
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("save config: {}", e)))?;

    if !reload_enabled {
        // The metric server picks the change up through its file watch.
        return Ok(());
    }
    metrics.inc_config_loads();
    let status = querier
        .reload()
        .await
        .map_err(|e| Error::metric_query(format!("reload config: {}", e)))?;
    if status != 200 {
        return Err(Error::Reload(status));
    }
    Ok(())
}
