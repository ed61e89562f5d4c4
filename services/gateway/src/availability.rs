//! Device liveness tracking. A device is available as long as it has been
//! seen within `AVAILABILITY_TIMEOUT_SECONDS`, or has an open streaming
//! subscription even if its last request was further back than that.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::subscriptions::SubscriptionRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
}

#[derive(Clone)]
pub struct AvailabilityTracker {
    timeout_seconds: i64,
    last_seen: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    statuses: Arc<RwLock<HashMap<String, AvailabilityStatus>>>,
}

impl AvailabilityTracker {
    pub fn new(timeout_seconds: i64) -> Self {
        Self {
            timeout_seconds,
            last_seen: Arc::new(RwLock::new(HashMap::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn mark_seen(&self, serial: &str) {
        self.last_seen
            .write()
            .await
            .insert(serial.to_owned(), Utc::now());
        self.statuses
            .write()
            .await
            .insert(serial.to_owned(), AvailabilityStatus::Available);
    }

    pub async fn is_available(&self, serial: &str) -> bool {
        self.statuses
            .read()
            .await
            .get(serial)
            .copied()
            .unwrap_or(AvailabilityStatus::Unavailable)
            == AvailabilityStatus::Available
    }

    pub async fn get_last_seen(&self, serial: &str) -> Option<DateTime<Utc>> {
        self.last_seen.read().await.get(serial).copied()
    }

    pub async fn get_all_statuses(&self) -> HashMap<String, AvailabilityStatus> {
        self.statuses.read().await.clone()
    }

    /// Marks any device not seen within the configured timeout as
    /// unavailable, unless it currently holds an active streaming
    /// subscription.
    async fn sweep_once(&self, subscriptions: &SubscriptionRegistry) {
        let now = Utc::now();
        let stale_serials: Vec<String> = {
            let last_seen = self.last_seen.read().await;
            last_seen
                .iter()
                .filter(|(_, seen)| (now - **seen).num_seconds() > self.timeout_seconds)
                .map(|(serial, _)| serial.clone())
                .collect()
        };

        let mut statuses = self.statuses.write().await;
        for serial in stale_serials {
            if subscriptions.get_subscription_count(&serial).await > 0 {
                continue;
            }
            statuses.insert(serial, AvailabilityStatus::Unavailable);
        }
    }

    /// Runs `sweep_once` on a fixed interval until the returned handle is
    /// dropped or the process shuts down.
    pub fn spawn_sweep(
        self,
        subscriptions: SubscriptionRegistry,
        interval_seconds: u64,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                ticker.tick().await;
                self.sweep_once(&subscriptions).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_seen_makes_device_available() {
        let tracker = AvailabilityTracker::new(120);
        assert!(!tracker.is_available("SERIAL0001").await);
        tracker.mark_seen("SERIAL0001").await;
        assert!(tracker.is_available("SERIAL0001").await);
        assert!(tracker.get_last_seen("SERIAL0001").await.is_some());
    }

    #[tokio::test]
    async fn sweep_respects_active_streaming_subscription() {
        let tracker = AvailabilityTracker::new(0);
        let subscriptions = SubscriptionRegistry::new(100);
        tracker.mark_seen("SERIAL0001").await;
        tracker.mark_seen("SERIAL0002").await;
        let (_handle, _receiver) = subscriptions
            .register_streaming("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await
            .unwrap();

        // timeout_seconds is 0, so both devices are immediately stale.
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.sweep_once(&subscriptions).await;

        assert!(tracker.is_available("SERIAL0001").await);
        assert!(!tracker.is_available("SERIAL0002").await);
    }
}
