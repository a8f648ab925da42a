use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{OrderStore, StoreError};
use crate::errors::StartupError;
use crate::models::{Delivery, Item, Order, Payment};
use crate::utils::{retry_with_delay, RetryConfig, RetryResult};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Tables (see schema.sql):
// - orders: one row per order, delivery_* and payment_* columns flattened
// - items:  one row per line item, keyed by a serial id, FK to orders
//
// `save` runs inside a single transaction. Any failing statement drops the
// transaction, which rolls back the order row and every item row with it.
//
// ============================================================================

const ORDER_COLUMNS: &str = "order_uid, track_number, entry,
    delivery_name, delivery_phone, delivery_zip, delivery_city,
    delivery_address, delivery_region, delivery_email,
    payment_transaction, payment_request_id, payment_currency, payment_provider,
    payment_amount, payment_payment_dt, payment_bank, payment_delivery_cost,
    payment_goods_total, payment_custom_fee,
    locale, internal_signature, customer_id, delivery_service,
    shardkey, sm_id, date_created, oof_shard";

const ITEM_COLUMNS: &str = "order_uid, chrt_id, track_number, price, rid, name,
    sale, size, total_price, nm_id, brand, status";

pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool, retrying with a fixed delay. Exhausting the attempt
    /// budget is fatal for startup.
    pub async fn connect_with_retry(
        database_url: &str,
        max_connections: u32,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self, StartupError> {
        let config = RetryConfig::fixed(max_attempts, retry_delay);
        let attempts = config.max_attempts;
        tracing::info!(max_attempts = attempts, "Connecting to PostgreSQL");

        let result = retry_with_delay(
            config,
            |attempt| async move {
                tracing::debug!(attempt, "Opening database pool");
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(database_url)
                    .await
            },
        )
        .await;

        match result {
            RetryResult::Success(pool) => {
                tracing::info!("✅ Connected to PostgreSQL");
                Ok(Self::new(pool))
            }
            RetryResult::Failed(e) => Err(StartupError::DependencyUnavailable {
                dependency: "database",
                attempts,
                reason: e.to_string(),
            }),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let insert_order = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
            )"
        );

        let delivery = &order.delivery;
        let payment = &order.payment;

        sqlx::query(&insert_order)
            .bind(&order.order_uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&delivery.name)
            .bind(&delivery.phone)
            .bind(&delivery.zip)
            .bind(&delivery.city)
            .bind(&delivery.address)
            .bind(&delivery.region)
            .bind(&delivery.email)
            .bind(&payment.transaction)
            .bind(&payment.request_id)
            .bind(&payment.currency)
            .bind(&payment.provider)
            .bind(payment.amount)
            .bind(payment.payment_dt)
            .bind(&payment.bank)
            .bind(payment.delivery_cost)
            .bind(payment.goods_total)
            .bind(payment.custom_fee)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_insert_error(&order.order_uid, e))?;

        let insert_item = format!(
            "INSERT INTO items ({ITEM_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );

        for item in &order.items {
            sqlx::query(&insert_item)
                .bind(&order.order_uid)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(item.price)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(item.sale)
                .bind(&item.size)
                .bind(item.total_price)
                .bind(item.nm_id)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            order_uid = %order.order_uid,
            item_count = order.items.len(),
            "Order persisted"
        );

        Ok(())
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_uid = $1"
        ))
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE order_uid = $1 ORDER BY id ASC"
        ))
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_order(items.into_iter().map(Item::from).collect())))
    }

    async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY date_created ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        // Orders and their items commit together, so every order seen above
        // already has all of its items visible to this later read.
        let item_rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<String, Vec<Item>> = HashMap::new();
        for row in item_rows {
            items_by_order
                .entry(row.order_uid.clone())
                .or_default()
                .push(Item::from(row));
        }

        let orders = rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.order_uid).unwrap_or_default();
                row.into_order(items)
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = orders.len(), "Loaded all orders");
        Ok(orders)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_insert_error(order_uid: &str, error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(order_uid.to_string())
        }
        _ => StoreError::Database(error),
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    delivery_name: String,
    delivery_phone: String,
    delivery_zip: String,
    delivery_city: String,
    delivery_address: String,
    delivery_region: String,
    delivery_email: String,
    payment_transaction: String,
    payment_request_id: String,
    payment_currency: String,
    payment_provider: String,
    payment_amount: i64,
    payment_payment_dt: i64,
    payment_bank: String,
    payment_delivery_cost: i64,
    payment_goods_total: i64,
    payment_custom_fee: i64,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

impl OrderRow {
    fn into_order(self, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.payment_transaction,
                request_id: self.payment_request_id,
                currency: self.payment_currency,
                provider: self.payment_provider,
                amount: self.payment_amount,
                payment_dt: self.payment_payment_dt,
                bank: self.payment_bank,
                delivery_cost: self.payment_delivery_cost,
                goods_total: self.payment_goods_total,
                custom_fee: self.payment_custom_fee,
            },
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_uid: String,
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i64,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i64,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_order;

    fn split(order: &Order) -> (OrderRow, Vec<ItemRow>) {
        let row = OrderRow {
            order_uid: order.order_uid.clone(),
            track_number: order.track_number.clone(),
            entry: order.entry.clone(),
            delivery_name: order.delivery.name.clone(),
            delivery_phone: order.delivery.phone.clone(),
            delivery_zip: order.delivery.zip.clone(),
            delivery_city: order.delivery.city.clone(),
            delivery_address: order.delivery.address.clone(),
            delivery_region: order.delivery.region.clone(),
            delivery_email: order.delivery.email.clone(),
            payment_transaction: order.payment.transaction.clone(),
            payment_request_id: order.payment.request_id.clone(),
            payment_currency: order.payment.currency.clone(),
            payment_provider: order.payment.provider.clone(),
            payment_amount: order.payment.amount,
            payment_payment_dt: order.payment.payment_dt,
            payment_bank: order.payment.bank.clone(),
            payment_delivery_cost: order.payment.delivery_cost,
            payment_goods_total: order.payment.goods_total,
            payment_custom_fee: order.payment.custom_fee,
            locale: order.locale.clone(),
            internal_signature: order.internal_signature.clone(),
            customer_id: order.customer_id.clone(),
            delivery_service: order.delivery_service.clone(),
            shardkey: order.shardkey.clone(),
            sm_id: order.sm_id,
            date_created: order.date_created,
            oof_shard: order.oof_shard.clone(),
        };
        let items = order
            .items
            .iter()
            .map(|item| ItemRow {
                order_uid: order.order_uid.clone(),
                chrt_id: item.chrt_id,
                track_number: item.track_number.clone(),
                price: item.price,
                rid: item.rid.clone(),
                name: item.name.clone(),
                sale: item.sale,
                size: item.size.clone(),
                total_price: item.total_price,
                nm_id: item.nm_id,
                brand: item.brand.clone(),
                status: item.status,
            })
            .collect();
        (row, items)
    }

    #[test]
    fn test_rows_reassemble_into_order() {
        let order = sample_order("uid-rows");
        let (row, items) = split(&order);

        let rebuilt = row.into_order(items.into_iter().map(Item::from).collect());

        assert_eq!(rebuilt, order);
    }

    #[test]
    fn test_column_lists_match_placeholders() {
        assert_eq!(ORDER_COLUMNS.split(',').count(), 28);
        assert_eq!(ITEM_COLUMNS.split(',').count(), 12);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_attempts_actually_made() {
        let err = PostgresOrderStore::connect_with_retry("not-a-url", 1, 0, Duration::ZERO)
            .await
            .err()
            .expect("malformed url must not connect");

        match err {
            StartupError::DependencyUnavailable { dependency, attempts, .. } => {
                assert_eq!(dependency, "database");
                assert_eq!(attempts, 1);
            }
        }
    }

    async fn live_store() -> PostgresOrderStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        PostgresOrderStore::connect_with_retry(&url, 2, 1, Duration::ZERO)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL with schema.sql applied (DATABASE_URL)"]
    async fn test_failed_item_insert_rolls_back_order_row() {
        let store = live_store().await;
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let mut order = sample_order(&uid);
        let mut bad_item = order.items[0].clone();
        // PostgreSQL rejects NUL bytes in TEXT, failing the second item insert
        bad_item.name = "broken\0name".to_string();
        order.items.push(bad_item);

        let err = store.save(&order).await.unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.get(&uid).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL with schema.sql applied (DATABASE_URL)"]
    async fn test_live_save_get_and_duplicate() {
        let store = live_store().await;
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let order = sample_order(&uid);

        store.save(&order).await.unwrap();
        assert_eq!(store.get(&uid).await.unwrap(), Some(order.clone()));

        let err = store.save(&order).await.unwrap_err();
        assert!(err.is_duplicate());
    }
}
