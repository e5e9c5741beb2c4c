//! The reconcile orchestration
//!
//! One tick runs, in order: discovery, autoscaler evaluation, rule-file
//! collection, per-workload scrape-plan generation (with seed-policy
//! shadowing), policy diff, policy apply (prune before add), config assembly
//! and conditional reload. The whole tick holds the controller lock;
//! observers of the targets list take the same lock and see either the pre-
//! or post-tick snapshot.

use crate::{assemble, autoscaler, differ, discovery, generate, metadata};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use variant_cf::{CloudController, MetricQuerier, NameResolver};
use variant_core::{
    prune_policies_by_destination, uniq_policies, Error, Policy, Result, VariantConfig,
};
use variant_metrics::VariantMetrics;
use variant_promcfg::{BasicAuth, PrometheusConfig, RuleNode, ScrapeConfig};

/// The controller core. Construction reads the seed configuration (fatal on
/// failure) and snapshots the policies already present on the control plane.
pub struct Reconciler {
    config: VariantConfig,
    client: Arc<dyn CloudController>,
    querier: Arc<dyn MetricQuerier>,
    resolver: NameResolver,
    metrics: VariantMetrics,
    selectors: discovery::Selectors,
    spaces: Vec<String>,
    config_path: PathBuf,
    state: Mutex<ReconcileState>,
}

/// State owned by the reconcile worker, guarded by the controller lock
struct ReconcileState {
    /// Seed configuration text, re-parsed every tick
    start_config: String,
    /// Policies observed at startup; live workloads shadow their entries
    seed_policies: Vec<Policy>,
    /// destination guid -> authored by this controller
    known_variants: HashMap<String, bool>,
    engine: autoscaler::Engine,
    /// Scrape jobs of the last completed tick (observation API)
    targets: Vec<ScrapeConfig>,
    /// Content hash of the last persisted configuration
    last_hash: Option<String>,
}

impl Reconciler {
    /// Build the reconciler. Fails when the seed configuration cannot be
    /// read or parsed; a failure to list the seed policies degrades to an
    /// empty seed set.
    pub async fn new(
        config: VariantConfig,
        client: Arc<dyn CloudController>,
        querier: Arc<dyn MetricQuerier>,
        metrics: VariantMetrics,
    ) -> Result<Self> {
        let start_config = std::fs::read_to_string(&config.prometheus_config)
            .map_err(|e| Error::config(format!("read prometheus config: {}", e)))?;
        PrometheusConfig::from_yaml(&start_config)
            .map_err(|e| Error::config(format!("load prometheus config: {}", e)))?;

        let seed_policies = match client.policies(&config.thanos_id).await {
            Ok(policies) => policies,
            Err(e) => {
                warn!(error = %e, "failed to list seed policies, starting with an empty seed set");
                Vec::new()
            }
        };
        let mut known_variants = HashMap::new();
        for policy in &seed_policies {
            // Observed but not authored.
            known_variants.insert(policy.destination.clone(), false);
        }

        let selectors = discovery::Selectors::from_config(&config);
        if config.debug {
            for selector in &selectors.primary {
                debug!(%selector, "active selector");
            }
        }
        let spaces = config.space_list();
        let config_path = PathBuf::from(&config.prometheus_config);

        Ok(Self {
            config,
            client,
            querier,
            resolver: NameResolver::new(),
            metrics,
            selectors,
            spaces,
            config_path,
            state: Mutex::new(ReconcileState {
                start_config,
                seed_policies,
                known_variants,
                engine: autoscaler::Engine::new(),
                targets: Vec::new(),
                last_hash: None,
            }),
        })
    }

    /// Run one reconcile pass unless one is already in flight, in which case
    /// the tick is dropped and `None` returned.
    pub async fn try_reconcile(&self) -> Option<Result<()>> {
        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => return None,
        };
        Some(self.run_tick(&mut guard).await)
    }

    /// Run one reconcile pass, waiting for any in-flight pass to finish.
    pub async fn reconcile(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        self.run_tick(&mut guard).await
    }

    /// The scrape jobs of the last completed tick.
    pub async fn targets(&self) -> Vec<ScrapeConfig> {
        self.state.lock().await.targets.clone()
    }

    async fn run_tick(&self, st: &mut ReconcileState) -> Result<()> {
        let started = Instant::now();
        let result = self.reconcile_inner(st).await;
        self.metrics
            .set_scrape_interval(started.elapsed().as_millis() as f64);
        self.metrics.inc_total_incursions();
        if result.is_err() {
            self.metrics.inc_error_incursions();
        }
        result
    }

    async fn reconcile_inner(&self, st: &mut ReconcileState) -> Result<()> {
        let discovery =
            discovery::discover(self.client.as_ref(), &self.selectors, &self.spaces).await?;

        // Autoscaler registrations, then one evaluation pass.
        for app in &discovery.autoscaler_apps {
            let md = match self.client.app_metadata(&app.guid).await {
                Ok(md) => md,
                Err(e) => {
                    warn!(app = %app.guid, error = %e, "metadata fetch failed");
                    continue;
                }
            };
            match metadata::parse_autoscalers(&md, &app.guid) {
                Ok(scalers) => st.engine.set_app_scalers(app.guid.clone(), scalers),
                Err(e) => warn!(app = %app.guid, error = %e, "autoscaler annotation rejected"),
            }
        }
        st.engine
            .evaluate_all(self.client.as_ref(), self.querier.as_ref())
            .await;

        // Rule files.
        let mut rule_files: BTreeMap<String, Vec<RuleNode>> = BTreeMap::new();
        for app in &discovery.rules_apps {
            let md = match self.client.app_metadata(&app.guid).await {
                Ok(md) => md,
                Err(e) => {
                    warn!(app = %app.guid, error = %e, "metadata fetch failed");
                    continue;
                }
            };
            match metadata::parse_rules(&md) {
                Ok(rules) => {
                    rule_files.insert(format!("{}.yml", app.guid), rules);
                }
                Err(e) => warn!(app = %app.guid, error = %e, "rules annotation rejected"),
            }
        }

        // Desired state: per-workload policies and scrape jobs.
        let basic_auth = self.scrape_basic_auth();
        let mut jobs: Vec<ScrapeConfig> = Vec::new();
        let mut generated: Vec<Policy> = Vec::new();
        for app in &discovery.apps {
            // A workload present on this tick shadows its seed entries; the
            // generated policies are authoritative from here on.
            st.seed_policies =
                prune_policies_by_destination(std::mem::take(&mut st.seed_policies), &app.guid);

            let (org_name, space_name) = match self
                .resolver
                .org_and_space_names(self.client.as_ref(), &app.space_guid)
                .await
            {
                Ok(names) => names,
                Err(e) => {
                    warn!(app = %app.guid, error = %e, "org/space lookup failed");
                    (String::new(), String::new())
                }
            };

            match generate::scrape_plan_for_app(
                self.client.as_ref(),
                &self.config.thanos_id,
                &self.config.internal_domain_id,
                basic_auth.as_ref(),
                app,
                &org_name,
                &space_name,
            )
            .await
            {
                Ok(plan) => {
                    generated.extend(plan.policies);
                    jobs.push(plan.job);
                }
                Err(e) if e.is_workload_degenerate() => {
                    debug!(app = %app.guid, error = %e, "skipping workload");
                }
                Err(e) => {
                    warn!(app = %app.guid, error = %e, "scrape plan failed");
                }
            }
        }
        self.metrics.set_detected_scrape_configs(jobs.len() as f64);
        self.metrics
            .set_managed_network_policies(generated.len() as f64);

        // Diff against the live policy table and apply, prune before add.
        let mut desired = st.seed_policies.clone();
        desired.extend(generated);
        let desired = uniq_policies(desired);
        let current = self
            .client
            .policies(&self.config.thanos_id)
            .await
            .map_err(Error::from)?;
        debug!(
            desired = desired.len(),
            current = current.len(),
            "policy state"
        );

        let delta = differ::diff_policies(&desired, &current, &mut st.known_variants);
        info!(
            adding = delta.to_add.len(),
            removing = delta.to_prune.len(),
            "applying policy delta"
        );
        for policy in &delta.to_prune {
            if let Err(e) = self.client.remove_policy(policy).await {
                warn!(?policy, error = %e, "error removing policy");
                self.metrics.inc_error_incursions();
            }
        }
        for policy in &delta.to_add {
            if let Err(e) = self.client.create_policy(policy).await {
                warn!(?policy, error = %e, "error creating policy");
                self.metrics.inc_error_incursions();
            }
        }

        // Refresh the observation snapshot.
        st.targets = jobs.clone();

        // Assemble the new configuration from the seed.
        let mut new_config = PrometheusConfig::from_yaml(&st.start_config)?;
        new_config.scrape_configs.extend(jobs);
        new_config.rule_files.extend(rule_files.keys().cloned());
        let output = new_config.to_yaml()?;
        if self.config.debug {
            debug!(config = %output, "assembled configuration");
        }

        assemble::save_and_reload(
            &self.config_path,
            &output,
            &rule_files,
            &mut st.last_hash,
            self.config.reload,
            self.querier.as_ref(),
            &self.metrics,
        )
        .await
    }

    fn scrape_basic_auth(&self) -> Option<BasicAuth> {
        if !self.config.basic_auth_enabled() {
            return None;
        }
        Some(BasicAuth {
            username: self.config.basic_auth_username.clone(),
            password: self.config.basic_auth_password.clone(),
        })
    }
}
