//! Configuration management for variant
//!
//! Configuration is read once at startup from the process environment with
//! the `VARIANT_` prefix (e.g. `VARIANT_API_ENDPOINT`) layered over built-in
//! defaults, and is treated as immutable for the process lifetime.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Minimum allowed reconcile period in seconds
pub const MIN_REFRESH_SECONDS: u64 = 5;

/// The literal tenant name that enables the default-tenant augmentation query
pub const DEFAULT_TENANT: &str = "default";

/// Main configuration structure for the variant controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Cloud Foundry API endpoint (e.g. https://api.sys.example.com)
    pub api_endpoint: String,

    /// Control-plane username
    pub username: String,

    /// Control-plane password
    pub password: String,

    /// Metric server (Prometheus/Thanos) base URL
    pub thanos_url: String,

    /// Identity of the observer workload; all authored policies use this as
    /// their source. Falls back to `VCAP_APPLICATION.application_id` when
    /// empty.
    pub thanos_id: String,

    /// GUID of the internal routing domain (apps.internal)
    pub internal_domain_id: String,

    /// Path to the seed Prometheus configuration file
    pub prometheus_config: String,

    /// Reconcile period in seconds (minimum 5)
    pub refresh: u64,

    /// Comma-separated tenant list; the literal `default` enables the
    /// unlabelled-tenant augmentation query
    pub tenants: String,

    /// Comma-separated space GUID allow-list; empty means all spaces
    pub spaces: String,

    /// Whether to POST `/-/reload` to the metric server after a config change
    pub reload: bool,

    /// Verbose logging
    pub debug: bool,

    /// Listen port for the controller's own /metrics endpoint
    pub port: u16,

    /// Optional basic-auth username for the self-metrics endpoint and for
    /// generated scrape jobs
    pub basic_auth_username: String,

    /// Optional basic-auth password, paired with `basic_auth_username`
    pub basic_auth_password: String,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            thanos_url: "http://localhost:9090".to_string(),
            thanos_id: String::new(),
            internal_domain_id: String::new(),
            prometheus_config: String::new(),
            refresh: 15,
            tenants: DEFAULT_TENANT.to_string(),
            spaces: String::new(),
            reload: true,
            debug: false,
            port: 1355,
            basic_auth_username: String::new(),
            basic_auth_password: String::new(),
        }
    }
}

impl VariantConfig {
    /// Load configuration from defaults overlaid with `VARIANT_`-prefixed
    /// environment variables.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(
                config::Environment::with_prefix("VARIANT").try_parsing(true),
            );

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.refresh < MIN_REFRESH_SECONDS {
            return Err(Error::config(format!(
                "refresh interval must be at least {} seconds [{}]",
                MIN_REFRESH_SECONDS, self.refresh
            )));
        }
        if self.api_endpoint.is_empty() {
            return Err(Error::config("api_endpoint must be set"));
        }
        if self.internal_domain_id.is_empty() {
            return Err(Error::config("internal_domain_id must be set"));
        }
        if self.prometheus_config.is_empty() {
            return Err(Error::config("prometheus_config must be set"));
        }
        Ok(())
    }

    /// Split the tenant list, returning the named tenants and whether the
    /// literal `default` tenant was present.
    pub fn tenant_list(&self) -> (Vec<String>, bool) {
        let mut named = Vec::new();
        let mut has_default = false;
        for tenant in self.tenants.split(',') {
            let tenant = tenant.trim();
            if tenant.is_empty() {
                continue;
            }
            if tenant == DEFAULT_TENANT {
                has_default = true;
            } else {
                named.push(tenant.to_string());
            }
        }
        (named, has_default)
    }

    /// The space GUID allow-list; empty means no filtering.
    pub fn space_list(&self) -> Vec<String> {
        self.spaces
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether basic-auth credentials are configured.
    pub fn basic_auth_enabled(&self) -> bool {
        !self.basic_auth_username.is_empty() && !self.basic_auth_password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> VariantConfig {
        VariantConfig {
            api_endpoint: "https://api.sys.example.com".to_string(),
            internal_domain_id: "409ec4df-d54d-4a93-8428-94999ecb50bc".to_string(),
            prometheus_config: "/etc/prometheus/prometheus.yml".to_string(),
            ..VariantConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = VariantConfig::default();
        assert_eq!(config.refresh, 15);
        assert_eq!(config.thanos_url, "http://localhost:9090");
        assert_eq!(config.port, 1355);
        assert!(config.reload);
        assert!(!config.debug);
    }

    #[test]
    fn test_refresh_boundary() {
        let mut config = valid_config();

        config.refresh = 4;
        assert!(config.validate().is_err());

        config.refresh = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.api_endpoint.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tenant_list_default_only() {
        let config = valid_config();
        let (named, has_default) = config.tenant_list();
        assert!(named.is_empty());
        assert!(has_default);
    }

    #[test]
    fn test_tenant_list_mixed() {
        let mut config = valid_config();
        config.tenants = "acme,default,globex".to_string();
        let (named, has_default) = config.tenant_list();
        assert_eq!(named, vec!["acme".to_string(), "globex".to_string()]);
        assert!(has_default);
    }

    #[test]
    fn test_space_list_empty() {
        let config = valid_config();
        assert!(config.space_list().is_empty());
    }

    #[test]
    fn test_space_list_parsing() {
        let mut config = valid_config();
        config.spaces = "space-a, space-b,".to_string();
        assert_eq!(
            config.space_list(),
            vec!["space-a".to_string(), "space-b".to_string()]
        );
    }

    #[test]
    fn test_basic_auth_requires_both() {
        let mut config = valid_config();
        assert!(!config.basic_auth_enabled());

        config.basic_auth_username = "scraper".to_string();
        assert!(!config.basic_auth_enabled());

        config.basic_auth_password = "secret".to_string();
        assert!(config.basic_auth_enabled());
    }
}
