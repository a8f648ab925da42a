use std::sync::Arc;

use super::outcome::{NoopObserver, PipelineObserver};
use crate::cache::OrderCache;
use crate::models::Order;
use crate::store::{OrderStore, StoreError};

/// Cache-aside reads: cache first, store on miss, populate the cache with
/// whatever the store found.
pub struct OrderQueryService {
    cache: Arc<dyn OrderCache>,
    store: Arc<dyn OrderStore>,
    observer: Arc<dyn PipelineObserver>,
}

impl OrderQueryService {
    pub fn new(cache: Arc<dyn OrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self {
            cache,
            store,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// `Ok(None)` means the order exists in neither tier. Store failures
    /// surface as errors and leave the cache untouched.
    pub async fn get_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        if let Some(order) = self.cache.get(order_uid).await {
            self.observer.cache_lookup(true);
            tracing::debug!(order_uid = %order_uid, "Cache hit");
            return Ok(Some(order));
        }
        self.observer.cache_lookup(false);

        match self.store.get(order_uid).await? {
            Some(order) => {
                self.cache.set(order_uid, order.clone()).await;
                tracing::debug!(order_uid = %order_uid, "Cache miss, loaded from store");
                Ok(Some(order))
            }
            None => {
                tracing::debug!(order_uid = %order_uid, "Order not found");
                Ok(None)
            }
        }
    }

    /// Load every stored order into the cache. Returns how many were loaded.
    pub async fn warm_cache(&self) -> Result<usize, StoreError> {
        let orders = self.store.get_all().await?;
        let count = orders.len();
        self.cache.load_from_db(orders).await;
        tracing::info!(count, "📦 Cache warmed from store");
        Ok(count)
    }
}
