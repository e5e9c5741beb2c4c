//! # variant-cf
//!
//! Clients for the two external planes the controller talks to:
//!
//! - the Cloud Foundry control plane (v3 API + CF-Networking policies API),
//!   behind the [`CloudController`] trait so the reconciler can be tested
//!   against an in-memory mock;
//! - the metric server (Prometheus/Thanos), behind the [`MetricQuerier`]
//!   trait for instant vector queries and configuration reloads.
//!
//! The crate also owns the session (token) cache and the TTL-bounded
//! space/org name cache.

pub mod cache;
pub mod client;
pub mod error;
pub mod http;
pub mod promql;
pub mod session;
pub mod types;

pub use cache::{NameResolver, TtlCache};
pub use client::{CloudController, MetricQuerier, Sample};
pub use error::{CfError, CfResult};
pub use http::CfApiClient;
pub use promql::PromClient;
pub use session::Session;
pub use types::{App, Metadata, Organization, Process, ProcessScale, Route, Space};
