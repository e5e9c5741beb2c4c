//! Relabel rules
//!
//! The same shape is read from the `prometheus.exporter.relabel_configs`
//! annotation (JSON) and written into the generated config (YAML), so one
//! serde type serves both.

use serde::{Deserialize, Serialize};

/// A single relabel rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelabelConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub separator: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub regex: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub modulus: u64,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_label: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub replacement: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}
