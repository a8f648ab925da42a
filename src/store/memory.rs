use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{OrderStore, StoreError};
use crate::models::Order;

/// In-process store with the same all-or-nothing contract as the database.
///
/// `set_available(false)` simulates an outage: every call fails with
/// `StoreError::Unavailable` and nothing is written. Call counters let tests
/// assert on store traffic.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
    unavailable: AtomicBool,
    save_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        Self {
            orders: RwLock::new(map),
            ..Self::default()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, order_uid: &str) -> bool {
        self.orders.read().await.contains_key(order_uid)
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_uid) {
            return Err(StoreError::Duplicate(order.order_uid.clone()));
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self.orders.read().await.get(order_uid).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
        self.check_available()?;

        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
