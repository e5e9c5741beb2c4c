//! Error handling for variant
//!
//! Provides a unified error type and result type for use across all variant
//! components.

/// Result type alias for variant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for variant
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Control-plane (Cloud Foundry API) errors
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    /// Metric endpoint query errors
    #[error("Metric query error: {0}")]
    MetricQuery(String),

    /// Malformed workload annotation payloads
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// A workload reported zero started instances
    #[error("no instances found")]
    NoInstances,

    /// A workload has no route under the internal domain
    #[error("no apps.internal route found")]
    NoInternalRoute,

    /// Autoscaler query template rendering errors
    #[error("Template error: {0}")]
    Template(String),

    /// Autoscaler expression evaluation errors
    #[error("Expression error: {0}")]
    Expression(String),

    /// The metric server rejected a reload request
    #[error("reload request returned status {0}")]
    Reload(u16),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a control-plane error
    pub fn control_plane(msg: impl Into<String>) -> Self {
        Self::ControlPlane(msg.into())
    }

    /// Create a metric query error
    pub fn metric_query(msg: impl Into<String>) -> Self {
        Self::MetricQuery(msg.into())
    }

    /// Create an annotation error
    pub fn annotation(msg: impl Into<String>) -> Self {
        Self::Annotation(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create an expression error
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Check if this error is a per-workload degenerate that should skip the
    /// workload rather than abort the reconcile tick
    pub fn is_workload_degenerate(&self) -> bool {
        matches!(
            self,
            Error::NoInstances | Error::NoInternalRoute | Error::Annotation(_)
        )
    }

    /// Get the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::ControlPlane(_) => "control_plane",
            Error::MetricQuery(_) => "metric_query",
            Error::Annotation(_) => "annotation",
            Error::NoInstances => "no_instances",
            Error::NoInternalRoute => "no_internal_route",
            Error::Template(_) => "template",
            Error::Expression(_) => "expression",
            Error::Reload(_) => "reload",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}
