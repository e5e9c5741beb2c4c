//! Reconcile activity metrics

use crate::Result;
use prometheus::{Gauge, IntCounter, Registry};

/// Gauges and counters describing what the reconciler is doing.
///
/// Cloning is cheap; the underlying metric values are shared.
#[derive(Debug, Clone)]
pub struct VariantMetrics {
    scrape_interval: Gauge,
    detected_scrape_configs: Gauge,
    managed_network_policies: Gauge,
    total_incursions: IntCounter,
    error_incursions: IntCounter,
    config_cache_hits: IntCounter,
    config_loads: IntCounter,
}

impl VariantMetrics {
    /// Create the metric set. Call [`VariantMetrics::register`] to attach it
    /// to a registry.
    pub fn new() -> Result<Self> {
        Ok(Self {
            scrape_interval: Gauge::new(
                "variant_scrape_interval",
                "The last reconcile duration in milliseconds",
            )?,
            detected_scrape_configs: Gauge::new(
                "variant_scrape_configs_detected",
                "Detected scrape configs",
            )?,
            managed_network_policies: Gauge::new(
                "variant_network_policies_managed",
                "The number of network policies being managed by variant",
            )?,
            total_incursions: IntCounter::new(
                "variant_incursions_total",
                "Total number of incursions (reconciles) done by variant so far",
            )?,
            error_incursions: IntCounter::new(
                "variant_incursions_error",
                "Total number of incursions that went wrong",
            )?,
            config_cache_hits: IntCounter::new(
                "variant_config_cache_hits_total",
                "Total number of config file cache hits",
            )?,
            config_loads: IntCounter::new(
                "variant_config_loads_total",
                "Total number of Prometheus config reload requests",
            )?,
        })
    }

    /// Register all metrics with a Prometheus registry.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.scrape_interval.clone()))?;
        registry.register(Box::new(self.detected_scrape_configs.clone()))?;
        registry.register(Box::new(self.managed_network_policies.clone()))?;
        registry.register(Box::new(self.total_incursions.clone()))?;
        registry.register(Box::new(self.error_incursions.clone()))?;
        registry.register(Box::new(self.config_cache_hits.clone()))?;
        registry.register(Box::new(self.config_loads.clone()))?;
        Ok(())
    }

    pub fn set_scrape_interval(&self, millis: f64) {
        self.scrape_interval.set(millis);
    }

    pub fn set_detected_scrape_configs(&self, count: f64) {
        self.detected_scrape_configs.set(count);
    }

    pub fn set_managed_network_policies(&self, count: f64) {
        self.managed_network_policies.set(count);
    }

    pub fn inc_total_incursions(&self) {
        self.total_incursions.inc();
    }

    pub fn inc_error_incursions(&self) {
        self.error_incursions.inc();
    }

    pub fn inc_config_cache_hits(&self) {
        self.config_cache_hits.inc();
    }

    pub fn inc_config_loads(&self) {
        self.config_loads.inc();
    }

    /// Current value of the cache-hit counter (used by tests)
    pub fn config_cache_hits(&self) -> u64 {
        self.config_cache_hits.get()
    }

    /// Current value of the config-load counter (used by tests)
    pub fn config_loads(&self) -> u64 {
        self.config_loads.get()
    }

    /// Current value of the error counter (used by tests)
    pub fn error_incursions(&self) -> u64 {
        self.error_incursions.get()
    }

    /// Current value of the incursion counter (used by tests)
    pub fn total_incursions(&self) -> u64 {
        self.total_incursions.get()
    }
}
