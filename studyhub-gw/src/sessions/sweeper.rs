//! Background expiry of stale and finished sessions

use chrono::Utc;
use studyhub_common::config::SessionConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::SessionStore;

/// Spawn the periodic sweep loop
///
/// Runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn_sweeper(store: SessionStore, config: SessionConfig) -> JoinHandle<()> {
    let pending_timeout = config.pending_timeout();
    let retention = config.retention();
    let period = config.sweep_interval();

    info!(
        interval_secs = period.as_secs(),
        pending_timeout_secs = pending_timeout.as_secs(),
        retention_secs = retention.as_secs(),
        "Starting session sweeper"
    );

    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; nothing can be stale yet
        tick.tick().await;

        loop {
            tick.tick().await;
            store.sweep(Utc::now(), pending_timeout, retention).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionStatus;
    use std::time::Duration;
    use studyhub_common::events::EventBus;

    #[tokio::test]
    async fn test_sweeper_fails_stale_sessions() {
        let store = SessionStore::new(EventBus::new(8));
        store.create(Some("slow")).await.unwrap();

        let handle = spawn_sweeper(
            store.clone(),
            SessionConfig {
                pending_timeout_secs: 0,
                retention_secs: 3600,
                sweep_interval_secs: 1,
            },
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        let session = store.lookup("slow").await.unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }
}
