use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_pipeline::config::Config;
use order_pipeline::models::{Delivery, Item, Order, Payment};

const SEND_INTERVAL: Duration = Duration::from_secs(5);

/// Publishes a synthetic, valid order to the ingest topic every few seconds.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the filter reads RUST_LOG.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &config.kafka.brokers)
        .set("message.timeout.ms", "5000")
        .create()?;

    tracing::info!(topic = %config.kafka.topic, "🚀 Producing test orders");

    let mut ticker = tokio::time::interval(SEND_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let order = generate_order();
        let payload = match serde_json::to_vec(&order) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode order");
                continue;
            }
        };

        let record = FutureRecord::to(&config.kafka.topic)
            .key(&order.order_uid)
            .payload(&payload);

        match producer.send(record, Timeout::After(Duration::from_secs(5))).await {
            Ok(delivery) => {
                tracing::info!(order_uid = %order.order_uid, ?delivery, "Sent order")
            }
            Err((e, _)) => {
                tracing::error!(order_uid = %order.order_uid, error = %e, "Failed to send order")
            }
        }
    }

    tracing::info!("Producer stopped");
    Ok(())
}

fn generate_order() -> Order {
    let mut rng = rand::thread_rng();
    let order_uid = Uuid::new_v4().simple().to_string();
    let track_number = format!("WBILM{:010}", rng.gen_range(0..10_000_000_000u64));

    Order {
        order_uid: order_uid.clone(),
        track_number: track_number.clone(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: format!("+972{:07}", rng.gen_range(0..10_000_000)),
            zip: format!("{:07}", rng.gen_range(0..10_000_000)),
            city: "Kiryat Mozkin".to_string(),
            address: format!("Ploshad Mira {}", rng.gen_range(1..200)),
            region: "Kraiot".to_string(),
            email: format!("buyer{}@example.com", rng.gen_range(1..100_000)),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: rng.gen_range(100..10_000),
            payment_dt: Utc::now().timestamp(),
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: rng.gen_range(100_000..1_000_000),
            track_number,
            price: rng.gen_range(100..5_000),
            rid: Uuid::new_v4().simple().to_string(),
            name: "Mascaras".to_string(),
            sale: rng.gen_range(0..50),
            size: "0".to_string(),
            total_price: 317,
            nm_id: rng.gen_range(1_000_000..10_000_000),
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc::now(),
        oof_shard: "1".to_string(),
    }
}
