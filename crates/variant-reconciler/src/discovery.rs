//! Workload discovery
//!
//! Three label-selector queries per tick: the exporter set (optionally
//! restricted by tenant), the rules set, and the autoscaler set. The rules
//! and autoscaler queries degrade to empty on failure; a failed primary
//! query aborts the tick.

use tracing::{debug, warn};
use variant_cf::{App, CloudController};
use variant_core::{labels, Result, VariantConfig};

/// The three discovered workload sets of one tick
#[derive(Debug, Default)]
pub struct Discovery {
    /// Workloads to scrape (primary set)
    pub apps: Vec<App>,
    /// Workloads carrying rule annotations
    pub rules_apps: Vec<App>,
    /// Workloads carrying autoscaler annotations
    pub autoscaler_apps: Vec<App>,
}

/// Label selectors derived from the tenant configuration
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Selector terms of the primary query; joined with `,` on the wire
    pub primary: Vec<String>,
    /// Whether the unlabelled-tenant augmentation query runs
    pub default_tenant: bool,
}

impl Selectors {
    /// Build selectors from the tenant configuration.
    pub fn from_config(config: &VariantConfig) -> Self {
        let mut primary = vec![labels::label_is_true(labels::EXPORTER_LABEL)];
        let (named, default_tenant) = config.tenant_list();
        if !named.is_empty() {
            primary.push(labels::label_in(labels::TENANT_LABEL, &named));
        }
        Self {
            primary,
            default_tenant,
        }
    }

    /// The primary selector expression.
    pub fn primary_selector(&self) -> String {
        self.primary.join(",")
    }

    /// The augmentation selector: exporter label present, tenant label
    /// absent.
    pub fn augmentation_selector(&self) -> String {
        format!(
            "{},{}",
            self.primary[0],
            labels::label_absent(labels::TENANT_LABEL)
        )
    }
}

/// Deduplicate apps by GUID, first occurrence wins.
pub fn uniq_apps(apps: Vec<App>) -> Vec<App> {
    let mut result: Vec<App> = Vec::with_capacity(apps.len());
    for app in apps {
        if !result.iter().any(|a| a.guid == app.guid) {
            result.push(app);
        }
    }
    result
}

fn filter_spaces(apps: Vec<App>, spaces: &[String]) -> Vec<App> {
    if spaces.is_empty() {
        return apps;
    }
    apps.into_iter()
        .filter(|app| {
            spaces
                .iter()
                .any(|space| space.eq_ignore_ascii_case(&app.space_guid))
        })
        .collect()
}

/// Run the discovery queries for one tick.
pub async fn discover(
    client: &dyn CloudController,
    selectors: &Selectors,
    spaces: &[String],
) -> Result<Discovery> {
    let mut apps = client
        .apps_by_label_selector(&selectors.primary_selector())
        .await?;
    debug!(count = apps.len(), selector = %selectors.primary_selector(), "found exporter apps");

    if selectors.primary.len() > 1 && selectors.default_tenant {
        match client
            .apps_by_label_selector(&selectors.augmentation_selector())
            .await
        {
            Ok(default_apps) => apps.extend(default_apps),
            Err(e) => warn!(error = %e, "default-tenant query failed"),
        }
        debug!(count = apps.len(), "apps after tenant filtering");
    }

    let rules_apps = match client
        .apps_by_label_selector(&labels::label_is_true(labels::RULES_LABEL))
        .await
    {
        Ok(apps) => apps,
        Err(e) => {
            warn!(error = %e, "rules query failed");
            Vec::new()
        }
    };

    let autoscaler_apps = match client
        .apps_by_label_selector(&labels::label_is_true(labels::AUTOSCALER_LABEL))
        .await
    {
        Ok(apps) => apps,
        Err(e) => {
            warn!(error = %e, "autoscaler query failed");
            Vec::new()
        }
    };

    Ok(Discovery {
        apps: filter_spaces(uniq_apps(apps), spaces),
        rules_apps: filter_spaces(uniq_apps(rules_apps), spaces),
        autoscaler_apps: filter_spaces(uniq_apps(autoscaler_apps), spaces),
    })
}
