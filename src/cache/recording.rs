use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::OrderCache;
use crate::models::Order;

/// Deterministic cache: entries never expire, every call is counted.
#[derive(Default)]
pub struct RecordingCache {
    entries: RwLock<HashMap<String, Order>>,
    set_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, order_uid: &str) -> bool {
        self.entries.read().await.contains_key(order_uid)
    }
}

#[async_trait]
impl OrderCache for RecordingCache {
    async fn set(&self, order_uid: &str, order: Order) {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .await
            .insert(order_uid.to_string(), order);
    }

    async fn get(&self, order_uid: &str) -> Option<Order> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.entries.read().await.get(order_uid).cloned()
    }

    async fn load_from_db(&self, orders: Vec<Order>) {
        let mut entries = self.entries.write().await;
        for order in orders {
            entries.insert(order.order_uid.clone(), order);
        }
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
