//! Alerting and recording rule files

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A rule-file document: a list of rule groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroups {
    pub groups: Vec<RuleGroup>,
}

/// A named group of rules evaluated together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    pub rules: Vec<RuleNode>,
}

/// A single alerting or recording rule.
///
/// Exactly one of `record` and `alert` is set in a well-formed rule; the
/// controller passes whatever the annotation carried through to the metric
/// server, which does its own validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleNode {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub record: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub alert: String,

    pub expr: String,

    #[serde(rename = "for", skip_serializing_if = "String::is_empty")]
    pub for_: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}
