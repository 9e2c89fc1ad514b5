//! Background eviction of idle conversations.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::store::SessionStore;

/// Evict idle states once. Returns the number removed.
pub async fn sweep(store: &dyn SessionStore, timeout: TimeDelta) -> usize {
    let evicted = store.evict_idle(Utc::now(), timeout).await;
    for user_id in &evicted {
        info!("🧹 Evicted idle conversation for user {}", user_id);
    }
    evicted.len()
}

/// Spawn the periodic sweeper. The first sweep runs one `period` after start;
/// abort the returned handle to stop it.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    period: Duration,
    timeout: TimeDelta,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let count = sweep(store.as_ref(), timeout).await;
            if count > 0 {
                info!(
                    "🧹 Session cleanup complete: {} idle conversations evicted, {} active",
                    count,
                    store.len().await
                );
            }
        }
    })
}
