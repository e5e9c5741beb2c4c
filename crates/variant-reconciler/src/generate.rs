//! Per-workload scrape plan generation
//!
//! Turns one discovered workload into the policies that open its exporter
//! ports and the scrape job that collects from its instances. Any failure in
//! here is a per-workload degenerate: the caller skips the workload and
//! emits nothing for it.

use crate::metadata::parse_relabel_configs;
use std::collections::BTreeMap;
use variant_cf::{App, CloudController};
use variant_core::{labels, Error, Policy, Result};
use variant_promcfg::{BasicAuth, HttpSdConfig, RelabelConfig, ScrapeConfig, StaticConfig};

/// Default exporter port
const DEFAULT_PORT: u16 = 9090;

/// Default exporter path
const DEFAULT_PATH: &str = "/metrics";

/// Default exporter scheme
const DEFAULT_SCHEME: &str = "http";

/// Default HTTP-SD path
const DEFAULT_TARGETS_PATH: &str = "/targets";

/// Matches the generated target format: group 1 is the instance index,
/// group 2 is host:port.
const DEFAULT_INSTANCE_SOURCE_REGEX: &str = "([^.]*).(.*)";

/// Suffix of every internal route host
const INTERNAL_DOMAIN_SUFFIX: &str = "apps.internal";

/// The derived artifacts for one workload
#[derive(Debug, Clone)]
pub struct ScrapePlan {
    /// Policies opening the exporter (and optionally HTTP-SD) ports
    pub policies: Vec<Policy>,
    /// The scrape job collecting from the workload's instances
    pub job: ScrapeConfig,
}

/// Compute the scrape plan for a workload.
pub async fn scrape_plan_for_app(
    client: &dyn CloudController,
    observer_id: &str,
    internal_domain_id: &str,
    basic_auth: Option<&BasicAuth>,
    app: &App,
    org_name: &str,
    space_name: &str,
) -> Result<ScrapePlan> {
    let processes = client
        .app_processes(&app.guid)
        .await
        .map_err(variant_core::Error::from)?;
    let instance_count = processes
        .iter()
        .filter_map(|p| p.instances)
        .max()
        .unwrap_or(0);
    if instance_count == 0 {
        return Err(Error::NoInstances);
    }

    let metadata = client
        .app_metadata(&app.guid)
        .await
        .map_err(variant_core::Error::from)?;

    let port: u16 = match metadata.annotation(labels::ANNOTATION_EXPORTER_PORT) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::annotation(format!("exporter port: {}", e)))?,
        None => DEFAULT_PORT,
    };
    let metrics_path = metadata
        .annotation(labels::ANNOTATION_EXPORTER_PATH)
        .unwrap_or(DEFAULT_PATH)
        .to_string();
    let scheme = metadata
        .annotation(labels::ANNOTATION_EXPORTER_SCHEME)
        .unwrap_or(DEFAULT_SCHEME)
        .to_string();
    let base_name = metadata
        .annotation(labels::ANNOTATION_EXPORTER_JOB_NAME)
        .unwrap_or(app.name.as_str());
    // Suffix with the first GUID segment for uniqueness across spaces.
    let job_name = format!("{}-{}", base_name, app.short_guid());

    let mut policies = vec![Policy::tcp(observer_id, &app.guid, port)];

    let routes = client
        .app_routes(&app.guid)
        .await
        .map_err(variant_core::Error::from)?;
    let internal_host = routes
        .iter()
        .find(|route| route.domain_guid == internal_domain_id)
        .map(|route| format!("{}.{}", route.host, INTERNAL_DOMAIN_SUFFIX))
        .ok_or(Error::NoInternalRoute)?;

    let targets: Vec<String> = (0..instance_count)
        .map(|index| format!("{}.{}:{}", index, internal_host, port))
        .collect();

    let mut static_labels = BTreeMap::new();
    static_labels.insert("cf_app_name".to_string(), app.name.clone());
    static_labels.insert("cf_space_name".to_string(), space_name.to_string());
    static_labels.insert("cf_org_name".to_string(), org_name.to_string());

    let mut job = ScrapeConfig {
        job_name,
        scheme,
        metrics_path,
        scrape_interval: metadata
            .annotation(labels::ANNOTATION_EXPORTER_SCRAPE_INTERVAL)
            .map(str::to_string),
        basic_auth: basic_auth.cloned(),
        static_configs: vec![StaticConfig {
            targets,
            labels: static_labels,
        }],
        ..ScrapeConfig::default()
    };

    if let Some(instance_name) = metadata.annotation(labels::ANNOTATION_INSTANCE_NAME) {
        let regex = metadata
            .annotation(labels::ANNOTATION_INSTANCE_SOURCE_REGEX)
            .unwrap_or(DEFAULT_INSTANCE_SOURCE_REGEX);
        job.metric_relabel_configs.push(RelabelConfig {
            source_labels: vec!["instance".to_string()],
            regex: regex.to_string(),
            target_label: "instance".to_string(),
            replacement: instance_name.to_string(),
            action: "replace".to_string(),
            ..RelabelConfig::default()
        });
    }

    // Multi-target scraping: the workload serves its own target list.
    if let Some(raw) = metadata.annotation(labels::ANNOTATION_TARGETS_PORT) {
        let targets_port: u16 = raw
            .parse()
            .map_err(|e| Error::annotation(format!("targets port: {}", e)))?;
        let targets_path = metadata
            .annotation(labels::ANNOTATION_TARGETS_PATH)
            .unwrap_or(DEFAULT_TARGETS_PATH);
        let targets_url = format!(
            "{}://{}:{}{}",
            job.scheme, internal_host, targets_port, targets_path
        );
        policies.push(Policy::tcp(observer_id, &app.guid, targets_port));
        job.relabel_configs.extend([
            RelabelConfig {
                source_labels: vec!["__address__".to_string()],
                target_label: "__param_target".to_string(),
                ..RelabelConfig::default()
            },
            RelabelConfig {
                source_labels: vec!["__param_target".to_string()],
                target_label: "instance".to_string(),
                ..RelabelConfig::default()
            },
            RelabelConfig {
                target_label: "__address__".to_string(),
                replacement: format!("{}:{}", internal_host, port),
                ..RelabelConfig::default()
            },
        ]);
        job.static_configs.clear();
        job.http_sd_configs = vec![HttpSdConfig { url: targets_url }];
    }

    job.relabel_configs.extend(parse_relabel_configs(&metadata)?);

    Ok(ScrapePlan { policies, job })
}
