//! Mock metric endpoint

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use variant_cf::{CfResult, MetricQuerier, Sample};

/// In-memory [`MetricQuerier`] implementation.
///
/// Returns a configurable vector for every query (or a per-query override)
/// and counts reload requests.
#[derive(Clone, Default)]
pub struct MockMetricQuerier {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    default_vector: Mutex<Vec<Sample>>,
    per_query: Mutex<HashMap<String, Vec<Sample>>>,
    queries: Mutex<Vec<String>>,
    reload_status: Mutex<u16>,
    reloads: Mutex<u64>,
}

impl MockMetricQuerier {
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.inner.reload_status.lock().unwrap() = 200;
        mock
    }

    /// Vector returned for queries without a per-query override.
    pub fn set_default_vector(&self, samples: Vec<Sample>) {
        *self.inner.default_vector.lock().unwrap() = samples;
    }

    /// Vector returned for one exact query string.
    pub fn set_vector_for_query(&self, query: impl Into<String>, samples: Vec<Sample>) {
        self.inner
            .per_query
            .lock()
            .unwrap()
            .insert(query.into(), samples);
    }

    /// Status code returned by reload requests.
    pub fn set_reload_status(&self, status: u16) {
        *self.inner.reload_status.lock().unwrap() = status;
    }

    /// Every query received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.inner.queries.lock().unwrap().clone()
    }

    /// How many reload requests were received.
    pub fn reload_count(&self) -> u64 {
        *self.inner.reloads.lock().unwrap()
    }
}

/// A vector sample with no labels, the common case in tests.
pub fn sample(value: f64) -> Sample {
    Sample {
        metric: HashMap::new(),
        value,
    }
}

#[async_trait]
impl MetricQuerier for MockMetricQuerier {
    async fn query_vector(&self, query: &str) -> CfResult<Vec<Sample>> {
        self.inner.queries.lock().unwrap().push(query.to_string());
        if let Some(samples) = self.inner.per_query.lock().unwrap().get(query) {
            return Ok(samples.clone());
        }
        Ok(self.inner.default_vector.lock().unwrap().clone())
    }

    async fn reload(&self) -> CfResult<u16> {
        *self.inner.reloads.lock().unwrap() += 1;
        Ok(*self.inner.reload_status.lock().unwrap())
    }
}
