//! Periodic housekeeping for the in-memory pool state.
//!
//! Purely a memory-reclamation optimization: tracker and binder both
//! validate expiry inline on every read.

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};

use crate::pool::{RateLimitTracker, SessionBinder};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawn the background sweeper. The task runs for the process lifetime.
pub fn spawn(
    tracker: Arc<RateLimitTracker>,
    sessions: Arc<SessionBinder>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let limits = tracker.sweep_expired();
            let bindings = sessions.sweep_expired();
            if limits > 0 || bindings > 0 {
                tracing::debug!(
                    "housekeeping: swept {} rate-limit entries, {} session bindings",
                    limits,
                    bindings
                );
            }
        }
    })
}
