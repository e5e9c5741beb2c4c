//! Autoscaler engine
//!
//! Each opted-in workload carries a list of autoscaler rules. Every tick the
//! engine renders each rule's query template, runs it against the metric
//! endpoint, evaluates the rule's boolean expression over the single sample,
//! and nudges the per-rule "want" count: up by one when the expression holds,
//! straight down to the rule's floor when it does not. The workload is then
//! scaled to the maximum want across its rules.
//!
//! Every per-rule failure writes state back (so the evaluation timestamp
//! advances) and moves on to the next rule.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};
use variant_cf::{CloudController, MetricQuerier, ProcessScale};
use variant_core::{Error, Result};

/// Floor applied to `min`
pub const MIN_INSTANCES: u32 = 1;

/// Ceiling applied to `max`
pub const MAX_INSTANCES: u32 = 50;

/// Default evaluation window
pub const DEFAULT_WINDOW: &str = "1m";

/// Default scale-up expression
pub const DEFAULT_EXPRESSION: &str = "query_result > 80";

/// Default query template
pub const DEFAULT_QUERY: &str = r#"avg(avg_over_time(cpu{guid="{{ guid }}"}[{{ window }}]))"#;

/// One autoscaling rule attached to one workload
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Autoscaler {
    pub min: u32,
    pub max: u32,
    #[serde(rename = "expr")]
    pub expression: String,
    pub query: String,
    pub window: String,
    /// Injected after parsing; never read from the annotation
    #[serde(skip)]
    pub guid: String,
}

impl Default for Autoscaler {
    fn default() -> Self {
        Self {
            min: 0,
            max: 0,
            expression: String::new(),
            query: String::new(),
            window: String::new(),
            guid: String::new(),
        }
    }
}

impl Autoscaler {
    /// Clamp bounds and fill unset fields with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.min < MIN_INSTANCES {
            self.min = MIN_INSTANCES;
        }
        if self.max > MAX_INSTANCES {
            self.max = MAX_INSTANCES;
        }
        if self.window.is_empty() {
            self.window = DEFAULT_WINDOW.to_string();
        }
        if self.expression.is_empty() {
            self.expression = DEFAULT_EXPRESSION.to_string();
        }
        if self.query.is_empty() {
            self.query = DEFAULT_QUERY.to_string();
        }
    }

    /// Stable identity of this rule across ticks.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}{}{}{}{}",
                self.max, self.expression, self.query, self.window, self.guid
            )
            .as_bytes(),
        );
        hex::encode(hasher.finalize())
    }

    /// Render the query template; `{{ guid }}` and `{{ window }}` resolve to
    /// this rule's fields.
    pub fn render_query(&self) -> Result<String> {
        let env = minijinja::Environment::new();
        env.render_str(
            &self.query,
            minijinja::context! {
                guid => self.guid.as_str(),
                window => self.window.as_str(),
            },
        )
        .map_err(|e| Error::template(e.to_string()))
    }
}

/// Evaluate a rule expression with `query_result` bound to the sample value.
pub fn evaluate_expression(expression: &str, query_result: f64) -> Result<bool> {
    use evalexpr::{ContextWithMutableVariables, HashMapContext, Value};

    let mut context = HashMapContext::new();
    context
        .set_value("query_result".to_string(), Value::Float(query_result))
        .map_err(|e| Error::expression(e.to_string()))?;
    evalexpr::eval_boolean_with_context(expression, &context)
        .map_err(|e| Error::expression(e.to_string()))
}

/// Per-rule evaluation state, keyed by rule hash. Lives for the process
/// lifetime; never garbage-collected.
#[derive(Debug, Clone)]
pub struct ScalerState {
    /// Instance count observed at the last evaluation
    pub current: u32,
    /// Instance count this rule wants
    pub want: u32,
    /// Reserved for a future scale-down cooldown window
    pub cooldown: u32,
    /// When this rule was last evaluated
    pub last_eval: Option<Instant>,
}

impl ScalerState {
    fn new(want: u32) -> Self {
        Self {
            current: 0,
            want,
            cooldown: 0,
            last_eval: None,
        }
    }
}

/// The engine: rule registrations plus per-rule state, evaluated once per
/// reconcile tick.
#[derive(Default)]
pub struct Engine {
    scalers: HashMap<String, Vec<Autoscaler>>,
    states: HashMap<String, ScalerState>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the rules for a workload. Registrations persist
    /// across ticks.
    pub fn set_app_scalers(&mut self, guid: impl Into<String>, scalers: Vec<Autoscaler>) {
        self.scalers.insert(guid.into(), scalers);
    }

    /// State for a rule hash, if it has been observed.
    pub fn state(&self, hash: &str) -> Option<&ScalerState> {
        self.states.get(hash)
    }

    /// Evaluate every registered workload and issue scale commands where the
    /// aggregate target differs from the current instance count.
    pub async fn evaluate_all(
        &mut self,
        cf: &dyn CloudController,
        prom: &dyn MetricQuerier,
    ) {
        let guids: Vec<String> = self.scalers.keys().cloned().collect();
        for guid in guids {
            let scalers = self.scalers.get(&guid).cloned().unwrap_or_default();
            debug!(app = %guid, rules = scalers.len(), "autoscaler processing");

            let processes = match cf.app_processes(&guid).await {
                Ok(processes) => processes,
                Err(e) => {
                    warn!(app = %guid, error = %e, "failed to read processes");
                    continue;
                }
            };
            let Some(web) = processes.into_iter().find(|p| p.process_type == "web") else {
                continue;
            };
            let current = web.instances.unwrap_or(0);

            let mut floor_min = 0u32;
            for scaler in &scalers {
                floor_min = floor_min.max(scaler.min);
                self.evaluate_scaler(scaler, current, prom).await;
            }

            let mut scale_to = floor_min;
            for scaler in &scalers {
                if let Some(state) = self.states.get(&scaler.hash()) {
                    scale_to = scale_to.max(state.want);
                }
            }

            if current == scale_to {
                debug!(app = %guid, instances = scale_to, "already at target scale");
                continue;
            }
            debug!(app = %guid, from = current, to = scale_to, "scaling");
            let scale = ProcessScale {
                instances: scale_to,
                memory_in_mb: web.memory_in_mb,
                disk_in_mb: web.disk_in_mb,
            };
            if let Err(e) = cf.scale_web_process(&guid, &scale).await {
                warn!(app = %guid, target = scale_to, error = %e, "scale command failed");
            }
        }
    }

    /// Evaluate one rule; state is written back on every exit path.
    async fn evaluate_scaler(
        &mut self,
        scaler: &Autoscaler,
        current: u32,
        prom: &dyn MetricQuerier,
    ) {
        let hash = scaler.hash();
        let mut state = self
            .states
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| ScalerState::new(scaler.min));
        state.last_eval = Some(Instant::now());
        state.current = current;

        let outcome = async {
            let query = scaler.render_query()?;
            let samples = prom
                .query_vector(&query)
                .await
                .map_err(|e| Error::metric_query(e.to_string()))?;
            if samples.len() != 1 {
                debug!(app = %scaler.guid, len = samples.len(), "unexpected result length");
                return Ok(None);
            }
            let scale_up = evaluate_expression(&scaler.expression, samples[0].value)?;
            Ok::<Option<bool>, Error>(Some(scale_up))
        }
        .await;

        match outcome {
            Ok(Some(true)) => {
                state.want = (current + 1).min(scaler.max).max(scaler.min);
            }
            Ok(Some(false)) => {
                // Rapid scale down: collapse straight to the floor.
                state.want = scaler.min;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(app = %scaler.guid, error = %e, "scaler evaluation failed");
            }
        }
        self.states.insert(hash, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use variant_cf::Process;
    use variant_dev::{sample, MockCloudController, MockMetricQuerier};

    fn scaler(min: u32, max: u32, guid: &str) -> Autoscaler {
        let mut scaler = Autoscaler {
            min,
            max,
            ..Autoscaler::default()
        };
        scaler.apply_defaults();
        scaler.guid = guid.to_string();
        scaler
    }

    fn web_process(guid: &str, instances: u32) -> Process {
        Process {
            guid: guid.to_string(),
            process_type: "web".to_string(),
            instances: Some(instances),
            memory_in_mb: Some(512),
            disk_in_mb: Some(1024),
        }
    }

    #[test]
    fn test_hash_is_stable_and_distinct() {
        let a = scaler(2, 5, "guid-1");
        assert_eq!(a.hash(), a.hash());

        let b = scaler(2, 6, "guid-1");
        assert_ne!(a.hash(), b.hash());

        let c = scaler(2, 5, "guid-2");
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_render_query_substitutes_fields() {
        let mut s = scaler(1, 5, "9e22fe38");
        s.window = "5m".to_string();
        let query = s.render_query().unwrap();
        assert_eq!(query, r#"avg(avg_over_time(cpu{guid="9e22fe38"}[5m]))"#);
    }

    #[test]
    fn test_render_query_bad_template() {
        let mut s = scaler(1, 5, "guid");
        s.query = "cpu{guid=\"{{ guid\"}".to_string();
        assert!(s.render_query().is_err());
    }

    #[test]
    fn test_evaluate_expression() {
        assert!(evaluate_expression("query_result > 80", 90.0).unwrap());
        assert!(!evaluate_expression("query_result > 80", 10.0).unwrap());
        assert!(evaluate_expression("query_result >= 1 && query_result < 2", 1.5).unwrap());
        assert!(evaluate_expression("query_result +", 1.0).is_err());
        // Non-boolean result is an error, not a scale-up.
        assert!(evaluate_expression("query_result + 1", 1.0).is_err());
    }

    #[tokio::test]
    async fn test_scale_up_steps_by_one() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 2)]);
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(90.0)]);

        let mut engine = Engine::new();
        engine.set_app_scalers("app-1", vec![scaler(2, 5, "app-1")]);
        engine.evaluate_all(&cf, &prom).await;

        let commands = cf.scale_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1.instances, 3);
        assert_eq!(commands[0].1.memory_in_mb, Some(512));

        // Next tick sees 3 and steps to 4.
        engine.evaluate_all(&cf, &prom).await;
        let commands = cf.scale_commands();
        assert_eq!(commands[1].1.instances, 4);
    }

    #[tokio::test]
    async fn test_scale_up_respects_max() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 5)]);
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(90.0)]);

        let mut engine = Engine::new();
        engine.set_app_scalers("app-1", vec![scaler(2, 5, "app-1")]);
        engine.evaluate_all(&cf, &prom).await;

        // want clamps to max == current, so no command is issued.
        assert!(cf.scale_commands().is_empty());
    }

    #[tokio::test]
    async fn test_scale_down_collapses_to_min() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 4)]);
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(10.0)]);

        let mut engine = Engine::new();
        engine.set_app_scalers("app-1", vec![scaler(2, 5, "app-1")]);
        engine.evaluate_all(&cf, &prom).await;

        let commands = cf.scale_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1.instances, 2);
    }

    #[tokio::test]
    async fn test_unexpected_vector_length_skips_decision() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 2)]);
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(90.0), sample(80.0)]);

        let mut engine = Engine::new();
        let rule = scaler(2, 5, "app-1");
        let hash = rule.hash();
        engine.set_app_scalers("app-1", vec![rule]);
        engine.evaluate_all(&cf, &prom).await;

        // No scale command, but the state exists and its timestamp advanced.
        assert!(cf.scale_commands().is_empty());
        let state = engine.state(&hash).unwrap();
        assert!(state.last_eval.is_some());
        assert_eq!(state.want, 2);
    }

    #[tokio::test]
    async fn test_want_stays_within_bounds() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 0)]);
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(90.0)]);

        let mut engine = Engine::new();
        let rule = scaler(2, 5, "app-1");
        let hash = rule.hash();
        engine.set_app_scalers("app-1", vec![rule.clone()]);
        engine.evaluate_all(&cf, &prom).await;

        let state = engine.state(&hash).unwrap();
        assert!(state.want >= rule.min && state.want <= rule.max);
    }

    #[tokio::test]
    async fn test_aggregation_takes_max_want_over_floor() {
        let cf = MockCloudController::new();
        cf.set_processes("app-1", vec![web_process("app-1", 3)]);
        let prom = MockMetricQuerier::new();
        // Both rules share the default query, so both see the same vector and
        // both scale down to their own min.
        prom.set_default_vector(vec![sample(10.0)]);

        let mut engine = Engine::new();
        let low = scaler(1, 5, "app-1");
        let mut high = scaler(2, 5, "app-1");
        high.window = "10m".to_string(); // distinct hash
        engine.set_app_scalers("app-1", vec![low, high]);
        engine.evaluate_all(&cf, &prom).await;

        // floor_min is 2, wants are {1, 2} → scale to 2.
        let commands = cf.scale_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1.instances, 2);
    }

    #[tokio::test]
    async fn test_no_web_process_is_skipped() {
        let cf = MockCloudController::new();
        cf.set_processes(
            "app-1",
            vec![Process {
                guid: "app-1".to_string(),
                process_type: "worker".to_string(),
                instances: Some(2),
                memory_in_mb: None,
                disk_in_mb: None,
            }],
        );
        let prom = MockMetricQuerier::new();
        prom.set_default_vector(vec![sample(90.0)]);

        let mut engine = Engine::new();
        engine.set_app_scalers("app-1", vec![scaler(2, 5, "app-1")]);
        engine.evaluate_all(&cf, &prom).await;

        assert!(cf.scale_commands().is_empty());
        assert!(prom.queries().is_empty());
    }
}
