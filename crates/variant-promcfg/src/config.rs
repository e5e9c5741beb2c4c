//! Top-level Prometheus configuration document and scrape configs

use crate::relabel::RelabelConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Prometheus configuration document.
///
/// Only the two sections the controller rewrites are modeled; everything
/// else in the seed file (global, alerting, remote_write, ...) passes
/// through the flattened mapping untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scrape_configs: Vec<ScrapeConfig>,

    #[serde(flatten)]
    pub other: serde_yaml::Mapping,
}

impl PrometheusConfig {
    /// Parse a configuration document from YAML.
    pub fn from_yaml(data: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    /// Serialize the configuration document to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// A single scrape job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub job_name: String,

    pub honor_timestamps: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheme: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub metrics_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    pub follow_redirects: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_relabel_configs: Vec<RelabelConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<StaticConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_sd_configs: Vec<HttpSdConfig>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            honor_timestamps: true,
            scrape_interval: None,
            scheme: String::new(),
            metrics_path: String::new(),
            basic_auth: None,
            follow_redirects: true,
            relabel_configs: Vec::new(),
            metric_relabel_configs: Vec::new(),
            static_configs: Vec::new(),
            http_sd_configs: Vec::new(),
        }
    }
}

/// A static service-discovery block: a fixed target list plus labels
/// attached to every series scraped from those targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// An HTTP service-discovery block: targets are fetched from a URL at
/// scrape-configuration time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpSdConfig {
    pub url: String,
}

/// Basic-auth credentials for the scrape HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}
