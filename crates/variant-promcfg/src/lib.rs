//! # variant-promcfg
//!
//! The subset of the Prometheus configuration model that variant generates
//! and rewrites: the top-level config document (with passthrough of keys the
//! controller does not own), scrape configs with static and HTTP
//! service-discovery blocks, relabel rules, and alerting/recording rule
//! groups.
//!
//! Serialization is deterministic: struct fields emit in declaration order
//! and all label maps are `BTreeMap`s, so identical inputs yield
//! byte-identical YAML. The reconciler's content hash depends on this.

pub mod config;
pub mod relabel;
pub mod rules;

pub use config::{BasicAuth, HttpSdConfig, PrometheusConfig, ScrapeConfig, StaticConfig};
pub use relabel::RelabelConfig;
pub use rules::{RuleGroup, RuleGroups, RuleNode};
