//! Mock control plane
//!
//! Simulates the Cloud Foundry API with in-memory tables and records every
//! write so tests can assert on exactly which policies were created or
//! removed and which scale commands were issued.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use variant_cf::{
    App, CfError, CfResult, CloudController, Metadata, Organization, Process, ProcessScale,
    Route, Space,
};
use variant_core::Policy;

/// In-memory [`CloudController`] implementation
#[derive(Clone, Default)]
pub struct MockCloudController {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    apps_by_selector: Mutex<HashMap<String, Vec<App>>>,
    failing_selectors: Mutex<HashSet<String>>,
    processes: Mutex<HashMap<String, Vec<Process>>>,
    routes: Mutex<HashMap<String, Vec<Route>>>,
    metadata: Mutex<HashMap<String, Metadata>>,
    spaces: Mutex<HashMap<String, Space>>,
    orgs: Mutex<HashMap<String, Organization>>,
    policies: Mutex<Vec<Policy>>,
    created_policies: Mutex<Vec<Policy>>,
    removed_policies: Mutex<Vec<Policy>>,
    failing_policies: Mutex<HashSet<String>>,
    scales: Mutex<Vec<(String, ProcessScale)>>,
    space_lookups: Mutex<u64>,
    selector_delay: Mutex<Option<Duration>>,
}

impl MockCloudController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the app list returned for an exact selector string.
    pub fn set_apps_for_selector(&self, selector: impl Into<String>, apps: Vec<App>) {
        self.inner
            .apps_by_selector
            .lock()
            .unwrap()
            .insert(selector.into(), apps);
    }

    /// Delay every selector query, to simulate a slow control plane.
    pub fn set_selector_delay(&self, delay: Duration) {
        *self.inner.selector_delay.lock().unwrap() = Some(delay);
    }

    /// Make a selector query fail with a 502.
    pub fn fail_selector(&self, selector: impl Into<String>) {
        self.inner
            .failing_selectors
            .lock()
            .unwrap()
            .insert(selector.into());
    }

    pub fn set_processes(&self, guid: impl Into<String>, processes: Vec<Process>) {
        self.inner
            .processes
            .lock()
            .unwrap()
            .insert(guid.into(), processes);
    }

    pub fn set_routes(&self, guid: impl Into<String>, routes: Vec<Route>) {
        self.inner.routes.lock().unwrap().insert(guid.into(), routes);
    }

    pub fn set_metadata(&self, guid: impl Into<String>, metadata: Metadata) {
        self.inner
            .metadata
            .lock()
            .unwrap()
            .insert(guid.into(), metadata);
    }

    pub fn set_space(&self, space: Space) {
        self.inner
            .spaces
            .lock()
            .unwrap()
            .insert(space.guid.clone(), space);
    }

    pub fn set_organization(&self, org: Organization) {
        self.inner.orgs.lock().unwrap().insert(org.guid.clone(), org);
    }

    /// Seed a policy into the current state without recording it as created.
    pub fn seed_policy(&self, policy: Policy) {
        self.inner.policies.lock().unwrap().push(policy);
    }

    /// Make create/remove calls fail for policies targeting a destination.
    pub fn fail_policies_for_destination(&self, destination: impl Into<String>) {
        self.inner
            .failing_policies
            .lock()
            .unwrap()
            .insert(destination.into());
    }

    /// Every policy created through the API, in call order.
    pub fn created_policies(&self) -> Vec<Policy> {
        self.inner.created_policies.lock().unwrap().clone()
    }

    /// Every policy removed through the API, in call order.
    pub fn removed_policies(&self) -> Vec<Policy> {
        self.inner.removed_policies.lock().unwrap().clone()
    }

    /// The current policy table.
    pub fn current_policies(&self) -> Vec<Policy> {
        self.inner.policies.lock().unwrap().clone()
    }

    /// Every scale command issued, in call order.
    pub fn scale_commands(&self) -> Vec<(String, ProcessScale)> {
        self.inner.scales.lock().unwrap().clone()
    }

    /// How many times a space record was fetched (cache-behavior tests).
    pub fn space_lookups(&self) -> u64 {
        *self.inner.space_lookups.lock().unwrap()
    }
}

#[async_trait]
impl CloudController for MockCloudController {
    async fn apps_by_label_selector(&self, selector: &str) -> CfResult<Vec<App>> {
        let delay = *self.inner.selector_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.failing_selectors.lock().unwrap().contains(selector) {
            return Err(CfError::Api {
                status: 502,
                body: "selector query failed".to_string(),
            });
        }
        Ok(self
            .inner
            .apps_by_selector
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn app_processes(&self, guid: &str) -> CfResult<Vec<Process>> {
        Ok(self
            .inner
            .processes
            .lock()
            .unwrap()
            .get(guid)
            .cloned()
            .unwrap_or_default())
    }

    async fn app_routes(&self, guid: &str) -> CfResult<Vec<Route>> {
        Ok(self
            .inner
            .routes
            .lock()
            .unwrap()
            .get(guid)
            .cloned()
            .unwrap_or_default())
    }

    async fn app_metadata(&self, guid: &str) -> CfResult<Metadata> {
        Ok(self
            .inner
            .metadata
            .lock()
            .unwrap()
            .get(guid)
            .cloned()
            .unwrap_or_default())
    }

    async fn space(&self, guid: &str) -> CfResult<Space> {
        *self.inner.space_lookups.lock().unwrap() += 1;
        self.inner
            .spaces
            .lock()
            .unwrap()
            .get(guid)
            .cloned()
            .ok_or_else(|| CfError::NotFound(format!("space {}", guid)))
    }

    async fn organization(&self, guid: &str) -> CfResult<Organization> {
        self.inner
            .orgs
            .lock()
            .unwrap()
            .get(guid)
            .cloned()
            .ok_or_else(|| CfError::NotFound(format!("organization {}", guid)))
    }

    async fn policies(&self, source: &str) -> CfResult<Vec<Policy>> {
        Ok(self
            .inner
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.source == source)
            .cloned()
            .collect())
    }

    async fn create_policy(&self, policy: &Policy) -> CfResult<()> {
        if self
            .inner
            .failing_policies
            .lock()
            .unwrap()
            .contains(&policy.destination)
        {
            return Err(CfError::Api {
                status: 500,
                body: "policy create failed".to_string(),
            });
        }
        self.inner.policies.lock().unwrap().push(policy.clone());
        self.inner
            .created_policies
            .lock()
            .unwrap()
            .push(policy.clone());
        Ok(())
    }

    async fn remove_policy(&self, policy: &Policy) -> CfResult<()> {
        if self
            .inner
            .failing_policies
            .lock()
            .unwrap()
            .contains(&policy.destination)
        {
            return Err(CfError::Api {
                status: 500,
                body: "policy remove failed".to_string(),
            });
        }
        self.inner.policies.lock().unwrap().retain(|p| p != policy);
        self.inner
            .removed_policies
            .lock()
            .unwrap()
            .push(policy.clone());
        Ok(())
    }

    async fn scale_web_process(&self, guid: &str, scale: &ProcessScale) -> CfResult<()> {
        self.inner
            .scales
            .lock()
            .unwrap()
            .push((guid.to_string(), scale.clone()));
        // Reflect the new instance count so the next tick observes it.
        if let Some(processes) = self.inner.processes.lock().unwrap().get_mut(guid) {
            for process in processes.iter_mut() {
                if process.process_type == "web" {
                    process.instances = Some(scale.instances);
                }
            }
        }
        Ok(())
    }
}
