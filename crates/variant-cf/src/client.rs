//! Client traits for the control plane and the metric endpoint
//!
//! The reconciler is written against these traits; production wires in the
//! reqwest-backed implementations, tests wire in the in-memory mocks from
//! `variant-dev`.

use crate::{App, CfResult, Metadata, Organization, Process, ProcessScale, Route, Space};
use async_trait::async_trait;
use std::collections::HashMap;
use variant_core::Policy;

/// Read/write access to the Cloud Foundry control plane.
///
/// All listing calls are read-only; the write surface is limited to policy
/// create/remove and process scaling.
#[async_trait]
pub trait CloudController: Send + Sync {
    /// List applications matching a label selector expression.
    async fn apps_by_label_selector(&self, selector: &str) -> CfResult<Vec<App>>;

    /// Process descriptors of an application.
    async fn app_processes(&self, guid: &str) -> CfResult<Vec<Process>>;

    /// Routes mapped to an application.
    async fn app_routes(&self, guid: &str) -> CfResult<Vec<Route>>;

    /// Labels and annotations of an application. A missing application
    /// yields empty metadata rather than an error.
    async fn app_metadata(&self, guid: &str) -> CfResult<Metadata>;

    /// Space record by GUID.
    async fn space(&self, guid: &str) -> CfResult<Space>;

    /// Organization record by GUID.
    async fn organization(&self, guid: &str) -> CfResult<Organization>;

    /// Network policies originating from the given source workload.
    async fn policies(&self, source: &str) -> CfResult<Vec<Policy>>;

    /// Create a single policy.
    async fn create_policy(&self, policy: &Policy) -> CfResult<()>;

    /// Remove a single policy.
    async fn remove_policy(&self, policy: &Policy) -> CfResult<()>;

    /// Scale the `web` process of an application.
    async fn scale_web_process(&self, guid: &str, scale: &ProcessScale) -> CfResult<()>;
}

/// One sample of an instant-query vector result
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Series labels
    pub metric: HashMap<String, String>,
    /// Sample value
    pub value: f64,
}

/// Instant queries and configuration reloads against the metric server.
#[async_trait]
pub trait MetricQuerier: Send + Sync {
    /// Run an instant query, returning the vector result.
    async fn query_vector(&self, query: &str) -> CfResult<Vec<Sample>>;

    /// POST `/-/reload`, returning the response status code.
    async fn reload(&self) -> CfResult<u16>;
}
