//! Long-poll fan-out registry. Devices park here while waiting for a bucket
//! they've already seen to change; writers notify by object key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nest_protocol::Bucket;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};

const CHANNEL_CAPACITY: usize = 8;

enum Waiter {
    Streaming {
        id: u64,
        object_keys: Vec<String>,
        sender: mpsc::Sender<Vec<Bucket>>,
    },
    OneShot {
        id: u64,
        object_keys: Vec<String>,
        sender: Option<oneshot::Sender<Vec<Bucket>>>,
    },
}

impl Waiter {
    fn id(&self) -> u64 {
        match self {
            Waiter::Streaming { id, .. } | Waiter::OneShot { id, .. } => *id,
        }
    }

    fn object_keys(&self) -> &[String] {
        match self {
            Waiter::Streaming { object_keys, .. } | Waiter::OneShot { object_keys, .. } => {
                object_keys
            }
        }
    }
}

/// Identifies a registered waiter for later removal. Opaque to callers.
#[derive(Clone, Copy, Debug)]
pub struct WaiterHandle {
    id: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct SubscriptionStats {
    pub total_streaming: usize,
    pub total_pending: usize,
    pub by_device: HashMap<String, usize>,
}

#[derive(Clone)]
pub struct SubscriptionRegistry {
    max_per_device: usize,
    next_id: Arc<AtomicU64>,
    waiters: Arc<RwLock<HashMap<String, Vec<Waiter>>>>,
}

impl SubscriptionRegistry {
    pub fn new(max_per_device: usize) -> Self {
        Self {
            max_per_device,
            next_id: Arc::new(AtomicU64::new(1)),
            waiters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a streaming waiter. Returns `None` if the device is already
    /// at `MAX_SUBSCRIPTIONS_PER_DEVICE`.
    pub async fn register_streaming(
        &self,
        serial: &str,
        object_keys: Vec<String>,
    ) -> Option<(WaiterHandle, mpsc::Receiver<Vec<Bucket>>)> {
        let mut waiters = self.waiters.write().await;
        let entry = waiters.entry(serial.to_owned()).or_default();
        if entry.len() >= self.max_per_device {
            return None;
        }
        let id = self.next_id();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        entry.push(Waiter::Streaming {
            id,
            object_keys,
            sender,
        });
        Some((WaiterHandle { id }, receiver))
    }

    pub async fn register_oneshot(
        &self,
        serial: &str,
        object_keys: Vec<String>,
    ) -> Option<(WaiterHandle, oneshot::Receiver<Vec<Bucket>>)> {
        let mut waiters = self.waiters.write().await;
        let entry = waiters.entry(serial.to_owned()).or_default();
        if entry.len() >= self.max_per_device {
            return None;
        }
        let id = self.next_id();
        let (sender, receiver) = oneshot::channel();
        entry.push(Waiter::OneShot {
            id,
            object_keys,
            sender: Some(sender),
        });
        Some((WaiterHandle { id }, receiver))
    }

    /// Removes a waiter by handle. Safe to call more than once; the second
    /// call is a no-op since the identity will no longer be present.
    pub async fn remove(&self, serial: &str, handle: WaiterHandle) {
        let mut waiters = self.waiters.write().await;
        if let Some(entry) = waiters.get_mut(serial) {
            entry.retain(|waiter| waiter.id() != handle.id);
            if entry.is_empty() {
                waiters.remove(serial);
            }
        }
    }

    /// Delivers `buckets` to every waiter subscribed to at least one of the
    /// touched object keys. One-shot waiters are removed after delivery.
    pub async fn notify(&self, serial: &str, buckets: &[Bucket]) {
        let touched: Vec<&str> = buckets.iter().map(|bucket| bucket.object_key.as_str()).collect();
        let mut waiters = self.waiters.write().await;
        let Some(entry) = waiters.get_mut(serial) else {
            return;
        };

        let mut remaining = Vec::with_capacity(entry.len());
        for mut waiter in entry.drain(..) {
            let matches = waiter
                .object_keys()
                .iter()
                .any(|key| touched.contains(&key.as_str()));
            if !matches {
                remaining.push(waiter);
                continue;
            }
            match &mut waiter {
                Waiter::Streaming { sender, .. } => {
                    let _ = sender.try_send(buckets.to_vec());
                    remaining.push(waiter);
                }
                Waiter::OneShot { sender, .. } => {
                    if let Some(sender) = sender.take() {
                        let _ = sender.send(buckets.to_vec());
                    }
                }
            }
        }
        *entry = remaining;
        if entry.is_empty() {
            waiters.remove(serial);
        }
    }

    /// Delivers `buckets` to every registered waiter for `serial`
    /// regardless of object key, used by the manual-notify and
    /// dismiss-pairing operator endpoints. Returns the number notified.
    pub async fn notify_all_subscribers(&self, serial: &str, buckets: &[Bucket]) -> usize {
        let mut waiters = self.waiters.write().await;
        let Some(entry) = waiters.get_mut(serial) else {
            return 0;
        };

        let mut notified = 0;
        let mut remaining = Vec::with_capacity(entry.len());
        for mut waiter in entry.drain(..) {
            match &mut waiter {
                Waiter::Streaming { sender, .. } => {
                    let _ = sender.try_send(buckets.to_vec());
                    notified += 1;
                    remaining.push(waiter);
                }
                Waiter::OneShot { sender, .. } => {
                    if let Some(sender) = sender.take() {
                        let _ = sender.send(buckets.to_vec());
                        notified += 1;
                    }
                }
            }
        }
        *entry = remaining;
        if entry.is_empty() {
            waiters.remove(serial);
        }
        notified
    }

    pub async fn get_subscription_count(&self, serial: &str) -> usize {
        self.waiters
            .read()
            .await
            .get(serial)
            .map_or(0, Vec::len)
    }

    pub async fn get_stats(&self) -> SubscriptionStats {
        let waiters = self.waiters.read().await;
        let mut stats = SubscriptionStats::default();
        for (serial, entry) in waiters.iter() {
            stats.by_device.insert(serial.clone(), entry.len());
            for waiter in entry {
                match waiter {
                    Waiter::Streaming { .. } => stats.total_streaming += 1,
                    Waiter::OneShot { .. } => stats.total_pending += 1,
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oneshot_waiter_resolves_and_deregisters() {
        let registry = SubscriptionRegistry::new(100);
        let (_, receiver) = registry
            .register_oneshot("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await
            .unwrap();

        let bucket = Bucket {
            serial: "SERIAL0001".to_owned(),
            object_key: "device.SERIAL0001".to_owned(),
            revision: 2,
            timestamp: 100,
            value: serde_json::json!({}),
        };
        registry.notify("SERIAL0001", std::slice::from_ref(&bucket)).await;

        let delivered = receiver.await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(registry.get_subscription_count("SERIAL0001").await, 0);
    }

    #[tokio::test]
    async fn notify_ignores_unrelated_object_keys() {
        let registry = SubscriptionRegistry::new(100);
        let (_, mut receiver) = registry
            .register_streaming("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await
            .unwrap();

        let unrelated = Bucket {
            serial: "SERIAL0001".to_owned(),
            object_key: "shared.SERIAL0001".to_owned(),
            revision: 1,
            timestamp: 1,
            value: serde_json::json!({}),
        };
        registry.notify("SERIAL0001", &[unrelated]).await;

        assert!(receiver.try_recv().is_err());
        assert_eq!(registry.get_subscription_count("SERIAL0001").await, 1);
    }

    #[tokio::test]
    async fn registration_rejected_past_cap() {
        let registry = SubscriptionRegistry::new(1);
        let first = registry
            .register_streaming("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await;
        assert!(first.is_some());

        let second = registry
            .register_streaming("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SubscriptionRegistry::new(100);
        let (handle, _receiver) = registry
            .register_streaming("SERIAL0001", vec!["device.SERIAL0001".to_owned()])
            .await
            .unwrap();

        registry.remove("SERIAL0001", handle).await;
        registry.remove("SERIAL0001", handle).await;
        assert_eq!(registry.get_subscription_count("SERIAL0001").await, 0);
    }
}
