//! Periodic all-calendars sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::state::AppSyncer;

/// Run the all-calendars sync on a fixed interval, forever. The first
/// pass runs immediately on startup.
pub async fn run(syncer: Arc<AppSyncer>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = syncer.sync_all().await {
            error!(error = %e, "scheduled sync pass failed");
        }
    }
}
