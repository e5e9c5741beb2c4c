//! Platform identity blob
//!
//! Cloud Foundry injects a JSON description of the running application into
//! the `VCAP_APPLICATION` environment variable. The controller falls back to
//! its `application_id` when no observer identity is configured explicitly.

use crate::{Error, Result};
use serde::Deserialize;

/// The subset of `VCAP_APPLICATION` the controller cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VcapApplication {
    #[serde(default)]
    pub cf_api: String,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub space_name: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub organization_name: String,
}

impl VcapApplication {
    /// Decode from a raw JSON string.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode from the `VCAP_APPLICATION` environment variable.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("VCAP_APPLICATION")
            .map_err(|_| Error::config("VCAP_APPLICATION is not set"))?;
        Self::parse(&raw)
    }
}
