use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use super::OrderCache;
use crate::models::Order;

// ============================================================================
// TTL Cache
// ============================================================================
//
// Expiry is decided at read time: `get` compares the entry's deadline with
// the clock, so an expired key is invisible whether or not the sweeper has
// run. The sweeper only reclaims memory.
//
// ============================================================================

struct Entry {
    order: Order,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct TtlCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Run `remove_expired` every `cleanup_interval` until `shutdown` flips.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        cleanup_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.remove_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired cache entries");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Cache sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl OrderCache for TtlCache {
    async fn set(&self, order_uid: &str, order: Order) {
        let entry = Entry {
            order,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(order_uid.to_string(), entry);
    }

    async fn get(&self, order_uid: &str) -> Option<Order> {
        let entries = self.entries.read().await;
        entries
            .get(order_uid)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.order.clone())
    }

    async fn load_from_db(&self, orders: Vec<Order>) {
        let expires_at = Instant::now() + self.ttl;

        let mut entries = self.entries.write().await;
        for order in orders {
            entries.insert(order.order_uid.clone(), Entry { order, expires_at });
        }
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_order;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("uid-1", sample_order("uid-1")).await;

        assert_eq!(cache.get("uid-1").await, Some(sample_order("uid-1")));
        assert_eq!(cache.get("uid-2").await, None);
    }

    #[tokio::test]
    async fn test_entry_expires_without_sweep() {
        let cache = TtlCache::new(Duration::from_millis(100));
        cache.set("uid-1", sample_order("uid-1")).await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get("uid-1").await, None);
        // still resident until swept
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_resets_expiry() {
        let cache = TtlCache::new(Duration::from_millis(150));
        cache.set("uid-1", sample_order("uid-1")).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.set("uid-1", sample_order("uid-1")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("uid-1").await.is_some());
    }

    #[tokio::test]
    async fn test_returned_value_is_a_snapshot() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("uid-1", sample_order("uid-1")).await;

        let mut copy = cache.get("uid-1").await.unwrap();
        copy.customer_id = "mutated".to_string();

        assert_eq!(cache.get("uid-1").await.unwrap().customer_id, "test");
    }

    #[tokio::test]
    async fn test_load_from_db_inserts_all() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache
            .load_from_db(vec![sample_order("a"), sample_order("b"), sample_order("c")])
            .await;

        assert_eq!(cache.len().await, 3);
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_expired_keeps_live_entries() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.set("old", sample_order("old")).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.set("fresh", sample_order("fresh")).await;

        assert_eq!(cache.remove_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_and_stops() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(20)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = cache.spawn_sweeper(Duration::from_millis(30), shutdown_rx);

        cache.set("uid-1", sample_order("uid-1")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.len().await, 0);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let mut tasks = Vec::new();

        for i in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                let uid = format!("uid-{}", i % 4);
                cache.set(&uid, sample_order(&uid)).await;
                let order = cache.get(&uid).await.expect("just written");
                assert_eq!(order.order_uid, uid);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len().await, 4);
    }
}
