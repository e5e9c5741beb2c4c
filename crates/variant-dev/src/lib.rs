//! # variant-dev
//!
//! In-memory mock implementations of the control-plane and metric endpoint
//! traits, plus shared fixtures. Used by the reconciler's unit and
//! integration tests; never shipped in the daemon.

pub mod fixtures;
pub mod mock_cf;
pub mod mock_promql;

pub use fixtures::{seed_prometheus_config, test_app};
pub use mock_cf::MockCloudController;
pub use mock_promql::{sample, MockMetricQuerier};
