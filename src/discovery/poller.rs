//! Periodic discovery loop.
//!
//! # Responsibilities
//! - Ask the refresher for the current targets on a fixed interval
//! - Hand successful results to the pool
//! - Close the pool once the shutdown signal fires
//! - Stop as soon as the pool is closed or dropped by its owner

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::discovery::{Refresher, Selector};
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::pool::Shared;
use crate::observability::metrics;

/// Background task keeping one pool's registry fresh.
pub struct DiscoveryLoop {
    pool: Weak<Shared>,
    refresher: Arc<dyn Refresher>,
    selector: Selector,
    interval: Duration,
}

impl DiscoveryLoop {
    pub(crate) fn new(
        pool: Weak<Shared>,
        refresher: Arc<dyn Refresher>,
        selector: Selector,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            refresher,
            selector,
            interval,
        }
    }

    /// Run until shutdown, or until the pool is closed or dropped.
    ///
    /// The first refresh happens immediately.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut closed = match self.pool.upgrade() {
            Some(pool) => pool.closed_signal(),
            None => return,
        };

        tracing::info!(
            namespace = %self.selector.namespace,
            service = %self.selector.service,
            interval = ?self.interval,
            "Discovery loop starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = closed.recv() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = closed.recv() => break,
                result = self.refresher.list_endpoints(&self.selector) => result,
            };

            let Some(pool) = self.pool.upgrade() else {
                tracing::debug!("Pool dropped, discovery loop exiting");
                return;
            };

            match result {
                Ok(targets) => {
                    metrics::record_refresh("ok", targets.len());
                    let summary = pool.refresh(targets);
                    tracing::debug!(targets = summary.total, "Discovery refresh applied");
                }
                Err(e) => {
                    metrics::record_refresh("error", 0);
                    tracing::warn!(
                        namespace = %self.selector.namespace,
                        service = %self.selector.service,
                        error = %e,
                        "Discovery refresh failed, keeping previous targets"
                    );
                }
            }
        }

        if let Some(pool) = self.pool.upgrade() {
            pool.close();
        }
        tracing::info!("Discovery loop stopped");
    }
}
