//! Idle session cleanup task
//!
//! Periodically closes sessions nobody has used for a while, stopping their
//! streams and pulls.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::state::SessionRegistry;

/// Spawn a background task that closes sessions idle for longer than `max_idle`.
///
/// Returns a `JoinHandle` that can be used to abort the task when shutting down.
pub fn spawn_session_cleanup_task(
    sessions: Arc<SessionRegistry>,
    max_idle: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(
        max_idle_secs = max_idle.as_secs(),
        interval_secs = interval.as_secs(),
        "Starting session cleanup task"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Don't run immediately on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = sessions.remove_idle(max_idle);
            if removed > 0 {
                info!(
                    removed_count = removed,
                    remaining = sessions.len(),
                    "Closed idle sessions"
                );
            } else {
                debug!("No idle sessions");
            }
        }
    })
}
