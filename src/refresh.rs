//! Periodic full reload, the backstop for missed invalidation events.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::PolicyEngine;

/// Reload `engine` every `period` until `cancel` fires.
///
/// Ticks are sequential, so a slow reload delays the next tick instead of
/// overlapping it. A tick that finds another load or mutation in flight is
/// skipped.
pub fn spawn_refresh(engine: PolicyEngine, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; startup already loaded.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match engine.try_load_full().await {
                Ok(Some(version)) => {
                    debug!(event = "Refresh", phase = "Reloaded", generation = version.generation);
                }
                Ok(None) => {}
                Err(e) => warn!(event = "Refresh", phase = "Failed", error = %e),
            }
        }
        debug!(event = "Refresh", phase = "Stopped");
    })
}
