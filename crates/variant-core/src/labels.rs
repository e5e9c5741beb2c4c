//! Label and annotation schema for variant
//!
//! Workloads opt into the controller's behavior through Cloud Foundry
//! metadata: labels select workloads for discovery, annotations carry the
//! per-workload scrape, rule, and autoscaler payloads.

use regex::Regex;
use std::sync::OnceLock;

/// Label selecting workloads to scrape
pub const EXPORTER_LABEL: &str = "variant.tva/exporter";

/// Label carrying a workload's tenant
pub const TENANT_LABEL: &str = "variant.tva/tenant";

/// Label selecting workloads with alerting/recording rules
pub const RULES_LABEL: &str = "variant.tva/rules";

/// Label selecting workloads with autoscaler rules
pub const AUTOSCALER_LABEL: &str = "variant.tva/autoscaler";

/// Exporter port (default 9090)
pub const ANNOTATION_EXPORTER_PORT: &str = "prometheus.exporter.port";

/// Exporter metrics path (default /metrics)
pub const ANNOTATION_EXPORTER_PATH: &str = "prometheus.exporter.path";

/// Exporter scheme (default http)
pub const ANNOTATION_EXPORTER_SCHEME: &str = "prometheus.exporter.scheme";

/// Scrape job name override (default: workload name)
pub const ANNOTATION_EXPORTER_JOB_NAME: &str = "prometheus.exporter.job_name";

/// Instance label replacement value
pub const ANNOTATION_INSTANCE_NAME: &str = "prometheus.exporter.instance_name";

/// Regex applied to the instance label when rewriting it
pub const ANNOTATION_INSTANCE_SOURCE_REGEX: &str = "prometheus.exporter.instance_source_regex";

/// Per-job scrape interval override
pub const ANNOTATION_EXPORTER_SCRAPE_INTERVAL: &str = "prometheus.exporter.scrape_interval";

/// Extra relabel configs, JSON array
pub const ANNOTATION_RELABEL_CONFIGS: &str = "prometheus.exporter.relabel_configs";

/// HTTP service-discovery port; presence switches the job to HTTP-SD
pub const ANNOTATION_TARGETS_PORT: &str = "prometheus.targets.port";

/// HTTP service-discovery path (default /targets)
pub const ANNOTATION_TARGETS_PATH: &str = "prometheus.targets.path";

/// Alerting/recording rules, JSON array
pub const ANNOTATION_RULES_JSON: &str = "prometheus.rules.json";

/// Autoscaler rules, JSON array
pub const ANNOTATION_AUTOSCALER_JSON: &str = "variant.autoscaler.json";

/// Matches indexed rule annotations: `prometheus.rules.{n|name}.json`
pub fn is_indexed_rules_annotation(key: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^prometheus\.rules\.(\d+|\w+)\.json$").unwrap())
        .is_match(key)
}

/// Selector string for a label that must be present with value `true`
pub fn label_is_true(label: &str) -> String {
    format!("{}=true", label)
}

/// Selector string for a label that must be absent
pub fn label_absent(label: &str) -> String {
    format!("!{}", label)
}

/// Selector string for a label whose value must be in the given set
pub fn label_in(label: &str, values: &[String]) -> String {
    format!("{} in ({})", label, values.join(","))
}
