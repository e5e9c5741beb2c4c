//! Shared test fixtures

use variant_cf::App;

/// A realistic seed Prometheus configuration with keys the controller does
/// not own (global, alerting) alongside pre-existing scrape configs.
pub fn seed_prometheus_config() -> &'static str {
    "\
global:
  scrape_interval: 15s
  evaluation_interval: 15s
  external_labels:
    cluster: thanos
    replica: 0
scrape_configs:
- job_name: prometheus
  static_configs:
  - targets:
    - localhost:9090
- job_name: variant
  static_configs:
  - targets:
    - localhost:1355
"
}

/// An app with a stable GUID derived from the given short prefix.
pub fn test_app(short: &str, name: &str, space_guid: &str) -> App {
    App {
        guid: format!("{}-38ce-4af6-b529-44d2853d072f", short),
        name: name.to_string(),
        space_guid: space_guid.to_string(),
    }
}
