// ============================================================================
// Durable Order Store
// ============================================================================
//
// The store of record for orders. An order and its items are written as one
// unit or not at all; there is no update or delete path.
//
// Implementations:
// - postgres/ - PostgreSQL over a sqlx pool (production)
// - memory/   - in-process map with outage injection (tests, local runs)
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::models::Order;

pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identity key is already taken. Nothing was written.
    #[error("order {0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order with all of its items atomically.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Point lookup. `Ok(None)` is the not-found outcome.
    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Every stored order, used to warm the cache at startup.
    async fn get_all(&self) -> Result<Vec<Order>, StoreError>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
