// ============================================================================
// Order Cache
// ============================================================================
//
// Key -> order snapshot map in front of the durable store. Values are owned
// clones; nothing handed out by `get` aliases the cache's own copy.
//
// - ttl/       - production cache with expiry and a background sweeper
// - recording/ - deterministic double (no expiry, call counters)
//
// ============================================================================

mod recording;
mod ttl;

use async_trait::async_trait;

use crate::models::Order;

pub use recording::RecordingCache;
pub use ttl::TtlCache;

#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Upsert; restarts the entry's expiry clock.
    async fn set(&self, order_uid: &str, order: Order);

    /// `None` for absent or expired keys.
    async fn get(&self, order_uid: &str) -> Option<Order>;

    /// Bulk upsert applied under a single write lock.
    async fn load_from_db(&self, orders: Vec<Order>);

    /// Number of entries held, expired-but-unswept ones included.
    async fn len(&self) -> usize;
}
