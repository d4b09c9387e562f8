use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::store::CredentialStore;

/// Periodically delete expired verification tokens.
///
/// Returns `None` when `every` is zero.
pub fn spawn_purge_worker(
    store: Arc<dyn CredentialStore>,
    every: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if every.is_zero() {
        info!("verification token purge disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.purge_expired_verification_tokens(Utc::now()).await {
                Ok(0) => debug!("no expired verification tokens"),
                Ok(count) => info!(count, "purged expired verification tokens"),
                Err(err) => error!("verification token purge failed: {err}"),
            }
        }
    }))
}
