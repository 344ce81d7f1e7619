//! Periodic store housekeeping

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::traits::RateStore;

/// Run `purge_expired` every `period` until `shutdown` is cancelled
pub fn spawn_retention(
    store: Arc<dyn RateStore>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(backend = store.backend(), period_secs = period.as_secs(), "Store retention started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "Retention pass complete"),
                    Err(e) => warn!(error = %e, "Retention pass failed"),
                },
            }
        }

        info!("Store retention stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRateStore;
    use crate::traits::raw_key;
    use common::{Rate, RateFields};

    #[tokio::test(start_paused = true)]
    async fn test_retention_purges_and_stops() {
        let store = Arc::new(InMemoryRateStore::new(Duration::from_secs(5), 10));
        store
            .put(
                &raw_key("PF1", "PF1_USDTRY"),
                &Rate::first("PF1_USDTRY", RateFields::new(1.0, 1.1, 1)),
            )
            .await
            .unwrap();

        let token = CancellationToken::new();
        let handle = spawn_retention(store.clone(), Duration::from_secs(1), token.clone());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(store.key_count(), 0);

        token.cancel();
        handle.await.unwrap();
    }
}
