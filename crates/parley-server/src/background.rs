//! Background tasks for the parley server.
//!
//! Includes:
//! - Reaping idle sessions so abandoned calls do not accumulate for the
//!   process lifetime.

use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the idle-session reaping task.
///
/// Runs indefinitely, periodically evicting sessions whose last activity is
/// older than `idle_threshold_seconds`. Expired-but-never-revisited sessions
/// are only cleaned up here; the per-turn expiry check handles revisited ones.
pub async fn start_session_reaper(state: Arc<AppState>, idle_threshold_seconds: u64) {
    if idle_threshold_seconds == 0 {
        tracing::warn!("session reaper disabled (threshold=0)");
        return;
    }

    // Sweep every 60 seconds or threshold/2, whichever is smaller (but min 1s)
    let interval_seconds = (idle_threshold_seconds / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(
        idle_threshold_seconds,
        interval_seconds,
        "starting session reaper"
    );

    loop {
        sleep(interval).await;

        let reaped = state
            .orchestrator
            .sessions()
            .reap_idle(Duration::from_secs(idle_threshold_seconds));
        if reaped > 0 {
            tracing::info!(count = reaped, "reaped idle sessions");
        }
    }
}
