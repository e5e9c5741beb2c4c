//! # variant-agent
//!
//! Daemon wiring for the variant controller: environment configuration,
//! platform fallback identity, tracing setup, the self-metrics server, and
//! the reconcile loop lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use variant_cf::{CfApiClient, PromClient};
use variant_core::{Error, Result, VariantConfig, VcapApplication};
use variant_metrics::{serve_metrics, BasicAuthGuard, VariantMetrics};
use variant_reconciler::{Reconciler, Scheduler};

/// Initialize tracing from `RUST_LOG`, falling back to `info` (or `debug`
/// when the debug flag is set).
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The observer identity: the configured value, or the platform-provided
/// `VCAP_APPLICATION.application_id` when unset. Startup aborts when
/// neither is available.
pub fn resolve_observer_id(config: &VariantConfig) -> Result<String> {
    if !config.thanos_id.is_empty() {
        return Ok(config.thanos_id.clone());
    }
    let vcap = VcapApplication::from_env().map_err(|e| {
        Error::config(format!(
            "not running on the platform and no observer identity configured: {}",
            e
        ))
    })?;
    if vcap.application_id.is_empty() {
        return Err(Error::config("VCAP_APPLICATION carries no application_id"));
    }
    Ok(vcap.application_id)
}

/// Run the daemon until a shutdown signal arrives.
pub async fn run(mut config: VariantConfig) -> Result<()> {
    config.thanos_id = resolve_observer_id(&config)?;
    info!(observer = %config.thanos_id, "starting variant");

    let registry = Arc::new(prometheus::Registry::new());
    let metrics = VariantMetrics::new().map_err(|e| Error::Other(anyhow::anyhow!(e)))?;
    metrics
        .register(&registry)
        .map_err(|e| Error::Other(anyhow::anyhow!(e)))?;

    let client = Arc::new(CfApiClient::new(
        &config.api_endpoint,
        &config.username,
        &config.password,
    )?);
    let querier = Arc::new(PromClient::new(&config.thanos_url)?);

    let reconciler = Arc::new(
        Reconciler::new(config.clone(), client, querier, metrics.clone()).await?,
    );
    let scheduler = Scheduler::new(Duration::from_secs(config.refresh))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(scheduler.run(reconciler.clone(), shutdown_rx));

    let auth = if config.basic_auth_enabled() {
        Some(BasicAuthGuard::new(
            &config.basic_auth_username,
            &config.basic_auth_password,
        ))
    } else {
        None
    };
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let metrics_handle = serve_metrics(bind_addr, registry, auth)
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!(e)))?;

    wait_for_termination().await;
    info!("shutting down");

    let _ = shutdown_tx.send(true);
    let _ = loop_handle.await;
    metrics_handle.abort();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = unix_signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> VariantConfig {
        VariantConfig {
            api_endpoint: "https://api.sys.example.com".to_string(),
            internal_domain_id: "dom".to_string(),
            prometheus_config: "/tmp/prometheus.yml".to_string(),
            ..VariantConfig::default()
        }
    }

    #[test]
    fn test_configured_observer_id_wins() {
        let mut config = base_config();
        config.thanos_id = "configured".to_string();
        assert_eq!(resolve_observer_id(&config).unwrap(), "configured");
    }

    #[test]
    fn test_missing_identity_aborts() {
        // No thanos_id and no VCAP_APPLICATION in the test environment.
        std::env::remove_var("VCAP_APPLICATION");
        let config = base_config();
        assert!(resolve_observer_id(&config).is_err());
    }
}
