//! End-to-end reconcile scenarios against the in-memory control plane and
//! metric endpoint mocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use variant_cf::{Metadata, Organization, Process, Route, Space};
use variant_core::{Policy, VariantConfig};
use variant_dev::{sample, seed_prometheus_config, test_app, MockCloudController, MockMetricQuerier};
use variant_metrics::VariantMetrics;
use variant_reconciler::Reconciler;

const DOMAIN: &str = "409ec4df-d54d-4a93-8428-94999ecb50bc";
const OBSERVER: &str = "yyy";

struct Harness {
    cf: MockCloudController,
    prom: MockMetricQuerier,
    metrics: VariantMetrics,
    config: VariantConfig,
    // Keeps the config folder alive for the test's duration.
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("prometheus.yml");
        std::fs::write(&config_path, seed_prometheus_config()).unwrap();

        let config = VariantConfig {
            api_endpoint: "https://api.sys.example.com".to_string(),
            thanos_id: OBSERVER.to_string(),
            internal_domain_id: DOMAIN.to_string(),
            prometheus_config: config_path.to_string_lossy().to_string(),
            ..VariantConfig::default()
        };

        Self {
            cf: MockCloudController::new(),
            prom: MockMetricQuerier::new(),
            metrics: VariantMetrics::new().unwrap(),
            config,
            _dir: dir,
        }
    }

    fn config_dir(&self) -> &std::path::Path {
        self._dir.path()
    }

    async fn reconciler(&self) -> Arc<Reconciler> {
        Arc::new(
            Reconciler::new(
                self.config.clone(),
                Arc::new(self.cf.clone()),
                Arc::new(self.prom.clone()),
                self.metrics.clone(),
            )
            .await
            .unwrap(),
        )
    }

    /// Register a scrapable app: exporter label, one internal route, and a
    /// web process with the given instance count.
    fn add_exporter_app(&self, short: &str, name: &str, instances: u32, port: &str) -> String {
        let app = test_app(short, name, "space-a");
        let guid = app.guid.clone();
        self.cf
            .set_apps_for_selector("variant.tva/exporter=true", vec![app]);
        self.cf.set_processes(
            &guid,
            vec![Process {
                guid: guid.clone(),
                process_type: "web".to_string(),
                instances: Some(instances),
                memory_in_mb: Some(512),
                disk_in_mb: Some(1024),
            }],
        );
        self.cf.set_routes(
            &guid,
            vec![Route {
                host: "ceres".to_string(),
                domain_guid: DOMAIN.to_string(),
            }],
        );
        self.cf.set_metadata(
            &guid,
            metadata(&[
                ("prometheus.exporter.port", port),
                ("prometheus.exporter.path", "/metrics"),
            ]),
        );
        self.cf.set_space(Space {
            guid: "space-a".to_string(),
            name: "tooling".to_string(),
            organization_guid: "org-a".to_string(),
        });
        self.cf.set_organization(Organization {
            guid: "org-a".to_string(),
            name: "platform".to_string(),
        });
        guid
    }
}

fn metadata(entries: &[(&str, &str)]) -> Metadata {
    Metadata {
        labels: HashMap::new(),
        annotations: entries
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect(),
    }
}

// Scenario 1: empty discovery, empty seed.
#[tokio::test]
async fn empty_discovery_writes_config_once() {
    let harness = Harness::new();
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    assert!(harness.cf.created_policies().is_empty());
    assert!(harness.cf.removed_policies().is_empty());
    assert!(reconciler.targets().await.is_empty());
    // First tick always differs from "no hash yet" and writes + reloads.
    assert_eq!(harness.prom.reload_count(), 1);
    assert_eq!(harness.metrics.config_cache_hits(), 0);
}

// Scenario 2: single workload, one exporter port.
#[tokio::test]
async fn single_workload_yields_policy_and_job() {
    let harness = Harness::new();
    let guid = harness.add_exporter_app("9e22fe38", "kong", 1, "8080");
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    assert_eq!(
        harness.cf.created_policies(),
        vec![Policy::tcp(OBSERVER, &guid, 8080)]
    );

    let targets = reconciler.targets().await;
    assert_eq!(targets.len(), 1);
    let job = &targets[0];
    assert_eq!(job.job_name, "kong-9e22fe38");
    assert_eq!(
        job.static_configs[0].targets,
        vec!["0.ceres.apps.internal:8080".to_string()]
    );
    assert_eq!(job.static_configs[0].labels["cf_org_name"], "platform");
    assert_eq!(job.static_configs[0].labels["cf_space_name"], "tooling");

    // The persisted config carries the generated job.
    let written = std::fs::read_to_string(harness.config_dir().join("prometheus.yml")).unwrap();
    assert!(written.contains("job_name: kong-9e22fe38"));
    assert!(written.contains("0.ceres.apps.internal:8080"));
    // ... and still carries the seed's own sections.
    assert!(written.contains("job_name: prometheus"));
    assert!(written.contains("external_labels"));
}

// Scenario 3: multi-instance target listing.
#[tokio::test]
async fn three_instances_yield_three_targets() {
    let harness = Harness::new();
    harness.add_exporter_app("9e22fe38", "kong", 3, "8080");
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    let targets = reconciler.targets().await;
    assert_eq!(
        targets[0].static_configs[0].targets,
        vec![
            "0.ceres.apps.internal:8080".to_string(),
            "1.ceres.apps.internal:8080".to_string(),
            "2.ceres.apps.internal:8080".to_string(),
        ]
    );
}

// Scenario 4: rules annotation parsed into a VariantGroup rule file.
#[tokio::test]
async fn rules_annotations_emit_rule_file() {
    let harness = Harness::new();
    let app = test_app("aaaa1111", "rules-app", "space-a");
    let guid = app.guid.clone();
    harness
        .cf
        .set_apps_for_selector("variant.tva/rules=true", vec![app]);
    harness.cf.set_metadata(
        &guid,
        metadata(&[
            (
                "prometheus.rules.json",
                r#"[{"alert": "KongWaiting", "expr": "kong_waiting > 100", "for": "1m"}]"#,
            ),
            (
                "prometheus.rules.1.json",
                r#"{"alert": "TxPG", "expr": "pg_tx_seconds > 30", "for": "1m"}"#,
            ),
        ]),
    );
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    let rule_path = harness.config_dir().join(format!("{}.yml", guid));
    let body = std::fs::read_to_string(&rule_path).unwrap();
    assert!(body.contains("name: VariantGroup"));
    assert!(body.contains("alert: KongWaiting"));
    assert!(body.contains("alert: TxPG"));

    // The main config references the rule file.
    let written = std::fs::read_to_string(harness.config_dir().join("prometheus.yml")).unwrap();
    assert!(written.contains(&format!("{}.yml", guid)));
}

// Scenario 5: hash-stable second tick.
#[tokio::test]
async fn unchanged_second_tick_is_a_cache_hit() {
    let harness = Harness::new();
    harness.add_exporter_app("9e22fe38", "kong", 1, "8080");
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();
    let created_after_first = harness.cf.created_policies().len();

    reconciler.reconcile().await.unwrap();

    assert_eq!(harness.metrics.config_cache_hits(), 1);
    assert_eq!(harness.prom.reload_count(), 1, "no second reload POST");
    // Idempotence: zero policy writes on the second run.
    assert_eq!(harness.cf.created_policies().len(), created_after_first);
    assert!(harness.cf.removed_policies().is_empty());
}

// Scenario 6: autoscaler scale-up steps and rapid scale-down.
#[tokio::test]
async fn autoscaler_steps_up_and_collapses_down() {
    let harness = Harness::new();
    let app = test_app("bbbb2222", "worker", "space-a");
    let guid = app.guid.clone();
    harness
        .cf
        .set_apps_for_selector("variant.tva/autoscaler=true", vec![app]);
    harness.cf.set_processes(
        &guid,
        vec![Process {
            guid: guid.clone(),
            process_type: "web".to_string(),
            instances: Some(2),
            memory_in_mb: Some(256),
            disk_in_mb: Some(1024),
        }],
    );
    harness.cf.set_metadata(
        &guid,
        metadata(&[(
            "variant.autoscaler.json",
            r#"[{"min": 2, "max": 5, "expr": "query_result > 80"}]"#,
        )]),
    );
    harness.prom.set_default_vector(vec![sample(90.0)]);
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();
    reconciler.reconcile().await.unwrap();

    let commands = harness.cf.scale_commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].1.instances, 3);
    assert_eq!(commands[1].1.instances, 4);
    assert_eq!(commands[0].1.memory_in_mb, Some(256));

    // Load drops: immediate collapse to the rule floor.
    harness.prom.set_default_vector(vec![sample(10.0)]);
    reconciler.reconcile().await.unwrap();

    let commands = harness.cf.scale_commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[2].1.instances, 2);
}

// Safety property: policies this controller never authored are never pruned.
#[tokio::test]
async fn foreign_seed_policies_survive() {
    let harness = Harness::new();
    // A pre-existing policy to a workload that is not discovered.
    harness
        .cf
        .seed_policy(Policy::tcp(OBSERVER, "operator-authored", 5432));
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();
    reconciler.reconcile().await.unwrap();

    assert!(harness.cf.removed_policies().is_empty());
    assert_eq!(
        harness.cf.current_policies(),
        vec![Policy::tcp(OBSERVER, "operator-authored", 5432)]
    );
}

// Seed shadowing: a live workload's stale seed policy is replaced once the
// controller authors for that destination.
#[tokio::test]
async fn live_workload_shadows_its_seed_policy() {
    let harness = Harness::new();
    let guid = harness.add_exporter_app("9e22fe38", "kong", 1, "8080");
    harness.cf.seed_policy(Policy::tcp(OBSERVER, &guid, 9999));
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    assert_eq!(
        harness.cf.created_policies(),
        vec![Policy::tcp(OBSERVER, &guid, 8080)]
    );
    assert_eq!(
        harness.cf.removed_policies(),
        vec![Policy::tcp(OBSERVER, &guid, 9999)]
    );
}

// Per-policy failure isolation: one failing destination does not stop the
// rest of the delta, and the tick still succeeds.
#[tokio::test]
async fn policy_apply_failures_are_isolated() {
    let harness = Harness::new();
    let app_a = test_app("aaaa1111", "alpha", "space-a");
    let app_b = test_app("bbbb2222", "beta", "space-a");
    let (guid_a, guid_b) = (app_a.guid.clone(), app_b.guid.clone());
    harness
        .cf
        .set_apps_for_selector("variant.tva/exporter=true", vec![app_a, app_b]);
    for guid in [&guid_a, &guid_b] {
        harness.cf.set_processes(
            guid,
            vec![Process {
                guid: guid.clone(),
                process_type: "web".to_string(),
                instances: Some(1),
                memory_in_mb: None,
                disk_in_mb: None,
            }],
        );
        harness.cf.set_routes(
            guid,
            vec![Route {
                host: "host".to_string(),
                domain_guid: DOMAIN.to_string(),
            }],
        );
        harness.cf.set_metadata(guid, Metadata::default());
    }
    harness.cf.set_space(Space {
        guid: "space-a".to_string(),
        name: "tooling".to_string(),
        organization_guid: "org-a".to_string(),
    });
    harness.cf.set_organization(Organization {
        guid: "org-a".to_string(),
        name: "platform".to_string(),
    });
    harness.cf.fail_policies_for_destination(&guid_a);
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    assert_eq!(
        harness.cf.created_policies(),
        vec![Policy::tcp(OBSERVER, &guid_b, 9090)]
    );
    assert!(harness.metrics.error_incursions() >= 1);
}

// A degenerate workload (no instances) contributes nothing but does not
// abort the tick.
#[tokio::test]
async fn zero_instance_workload_is_skipped() {
    let harness = Harness::new();
    let guid = harness.add_exporter_app("9e22fe38", "kong", 0, "8080");
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();

    assert!(harness.cf.created_policies().is_empty());
    assert!(reconciler.targets().await.is_empty());
    let _ = guid;
}

// Primary discovery failure aborts the tick and bumps the error counter.
#[tokio::test]
async fn primary_query_failure_aborts_tick() {
    let harness = Harness::new();
    harness.cf.fail_selector("variant.tva/exporter=true");
    let reconciler = harness.reconciler().await;

    assert!(reconciler.reconcile().await.is_err());
    assert_eq!(harness.metrics.error_incursions(), 1);
    assert_eq!(harness.metrics.total_incursions(), 1);
    assert_eq!(harness.prom.reload_count(), 0);
}

// Reconciles never overlap: a tick arriving mid-pass is dropped.
#[tokio::test]
async fn concurrent_tick_is_dropped() {
    let harness = Harness::new();
    harness.cf.set_selector_delay(Duration::from_millis(200));
    let reconciler = harness.reconciler().await;

    let background = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.reconcile().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(reconciler.try_reconcile().await.is_none());

    background.await.unwrap().unwrap();
    assert!(reconciler.try_reconcile().await.is_some());
}

// Name cache: repeated ticks resolve the space once.
#[tokio::test]
async fn space_lookup_is_cached_across_ticks() {
    let harness = Harness::new();
    harness.add_exporter_app("9e22fe38", "kong", 1, "8080");
    let reconciler = harness.reconciler().await;

    reconciler.reconcile().await.unwrap();
    reconciler.reconcile().await.unwrap();

    assert_eq!(harness.cf.space_lookups(), 1);
}
