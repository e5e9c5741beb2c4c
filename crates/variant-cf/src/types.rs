//! Control-plane resource types
//!
//! The flattened, consumer-facing shapes of the Cloud Foundry resources the
//! controller reads. The raw v3 wire envelopes (pagination, relationships)
//! live in the HTTP client and are mapped into these on the way out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An application workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub guid: String,
    pub name: String,
    pub space_guid: String,
}

impl App {
    /// The first dash-delimited segment of the GUID, used to make job names
    /// unique across spaces.
    pub fn short_guid(&self) -> &str {
        self.guid.split('-').next().unwrap_or(&self.guid)
    }
}

/// A process descriptor of an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub guid: String,
    pub process_type: String,
    /// Desired instance count; `None` when the platform reports no value
    pub instances: Option<u32>,
    pub memory_in_mb: Option<u64>,
    pub disk_in_mb: Option<u64>,
}

/// A route mapped to an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub host: String,
    pub domain_guid: String,
}

/// A space record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub guid: String,
    pub name: String,
    pub organization_guid: String,
}

/// An organization record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub guid: String,
    pub name: String,
}

/// Labels and annotations attached to a workload.
///
/// Values are nullable on the wire; a key set to `null` is treated the same
/// as an absent key by all consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub labels: HashMap<String, Option<String>>,
    #[serde(default)]
    pub annotations: HashMap<String, Option<String>>,
}

impl Metadata {
    /// Look up an annotation, treating null values as absent.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).and_then(|v| v.as_deref())
    }
}

/// A scale command for a process, preserving its resource assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessScale {
    pub instances: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_in_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_in_mb: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_guid() {
        let app = App {
            guid: "9e22fe38-38ce-4af6-b529-44d2853d072f".to_string(),
            name: "kong".to_string(),
            space_guid: "b6b0855f".to_string(),
        };
        assert_eq!(app.short_guid(), "9e22fe38");
    }

    #[test]
    fn test_metadata_null_annotation_is_absent() {
        let raw = r#"{
            "labels": {"variant.tva/exporter": "true"},
            "annotations": {"prometheus.exporter.port": "8080", "prometheus.exporter.path": null}
        }"#;
        let metadata: Metadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.annotation("prometheus.exporter.port"), Some("8080"));
        assert_eq!(metadata.annotation("prometheus.exporter.path"), None);
        assert_eq!(metadata.annotation("missing"), None);
    }

    #[test]
    fn test_process_scale_serialization() {
        let scale = ProcessScale {
            instances: 3,
            memory_in_mb: Some(512),
            disk_in_mb: None,
        };
        let json = serde_json::to_string(&scale).unwrap();
        assert!(json.contains("\"instances\":3"));
        assert!(json.contains("\"memory_in_mb\":512"));
        assert!(!json.contains("disk_in_mb"));
    }
}
