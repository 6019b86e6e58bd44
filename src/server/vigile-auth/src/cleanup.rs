//! Scheduled cleanup of expired blacklist records.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, trace, warn};

use crate::blacklist::BlacklistManager;

/// Shortest accepted interval between cleanup cycles.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Service that periodically deletes expired entries and revocations.
pub struct CleanupService {
    manager: Arc<BlacklistManager>,
    interval: Duration,
}

impl CleanupService {
    /// Creates a new cleanup service.
    ///
    /// Intervals shorter than [`MIN_CLEANUP_INTERVAL`] are raised to it.
    pub fn new(manager: Arc<BlacklistManager>, interval: Duration) -> Self {
        let interval = if interval < MIN_CLEANUP_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Cleanup interval too short, using minimum"
            );
            MIN_CLEANUP_INTERVAL
        } else {
            interval
        };

        Self { manager, interval }
    }

    /// Runs cleanup cycles until `shutdown` flips to `true`.
    ///
    /// The first cycle runs immediately. Failures are logged and retried on
    /// the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Cleanup service started");

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.manager.cleanup_expired_entries().await {
                        Ok(removed) => trace!(removed = removed, "Cleanup cycle complete"),
                        Err(e) => error!(error = %e, "Cleanup cycle failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Cleanup service shutting down");
                        break;
                    }
                }
            }
        }
    }
}
