//! Periodic background refresh of an [`OrderCache`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cache::{OrderCache, RefreshOutcome};

/// Spawn the refresh loop: one refresh immediately, then one every `every`
/// until `cancel` fires.
///
/// Each tick goes through the cache's single-flight guard, so it never
/// overlaps an on-demand refresh. Cancelling while a refresh is running
/// stops waiting for it; the refresh itself still completes on its own task.
pub fn spawn_background_refresh(
    cache: OrderCache,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let which = if first { "initial" } else { "background" };
            first = false;
            info!(which, "cache refresh triggered");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = cache.force_refresh() => match result {
                    Ok(RefreshOutcome::Completed(report)) => {
                        info!(which, total_orders = report.total_orders, "cache refresh done")
                    }
                    Ok(RefreshOutcome::AlreadyInFlight) => {
                        info!(which, "cache refresh skipped; another refresh in flight")
                    }
                    Err(e) => error!(which, error = %e, "cache refresh failed"),
                },
            }
        }
        info!("background cache refresh stopped");
    })
}
