//! Background maintenance worker.
//!
//! Periodically drops expired pending results and releases generation flags
//! whose operation never reported back.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::NotificationHub;

/// Run `hub.run_maintenance()` every `interval` until `cancel_token` fires.
pub fn spawn_maintenance(
    hub: Arc<NotificationHub>,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    // tokio::time::interval rejects a zero period.
    let interval = interval.max(Duration::from_millis(100));
    tokio::spawn(async move {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Starting notification maintenance worker");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Notification maintenance worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = hub.run_maintenance().await;
                    if report.expired_pending > 0 || !report.released_generations.is_empty() {
                        tracing::info!(
                            expired_pending = report.expired_pending,
                            released_generations = report.released_generations.len(),
                            "Maintenance sweep completed"
                        );
                    }
                }
            }
        }
    })
}
