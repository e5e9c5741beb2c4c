//! Periodic reconcile driver
//!
//! Arms a timer and invokes the reconciler on each tick. Single-flight is
//! enforced by the reconciler's own lock: a tick that finds the lock held is
//! dropped. One shutdown signal stops the loop between ticks; an in-flight
//! tick always runs to completion.

use crate::reconciler::Reconciler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use variant_core::{config::MIN_REFRESH_SECONDS, Error, Result};

/// Periodic single-flight reconcile driver
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    /// Create a scheduler. Periods below the hard minimum of five seconds
    /// are rejected.
    pub fn new(period: Duration) -> Result<Self> {
        if period < Duration::from_secs(MIN_REFRESH_SECONDS) {
            return Err(Error::config(format!(
                "refresh interval must be at least {} seconds [{}]",
                MIN_REFRESH_SECONDS,
                period.as_secs()
            )));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drive the reconciler until the shutdown signal fires. The first tick
    /// fires one full period after start.
    pub async fn run(self, reconciler: Arc<Reconciler>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_secs = self.period.as_secs(), "reconcile loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("reconciling");
                    match reconciler.try_reconcile().await {
                        Some(Ok(())) => {}
                        Some(Err(e)) => error!(error = %e, "error reconciling"),
                        None => debug!("previous reconcile still running, tick dropped"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("reconcile loop stopped");
                    break;
                }
            }
        }
    }
}
