//! # variant-metrics
//!
//! The controller's own observability surface: a set of Prometheus gauges
//! and counters describing reconcile activity, and an axum server exposing
//! them on `/metrics` (optionally behind basic auth).

pub mod endpoint;
pub mod metrics;

pub use endpoint::{serve_metrics, BasicAuthGuard};
pub use metrics::VariantMetrics;

/// Errors raised while setting up the metrics surface
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;
