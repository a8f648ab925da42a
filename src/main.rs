use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_pipeline::config::Config;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the filter reads RUST_LOG.
    let _ = dotenvy::dotenv();

    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=order_pipeline=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_pipeline=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order pipeline");

    let config = Config::from_env();
    tracing::info!(
        topic = %config.kafka.topic,
        dlq_topic = %config.kafka.dlq_topic,
        port = config.server.port,
        duplicate_policy = ?config.duplicate_policy,
        "Configuration loaded"
    );

    order_pipeline::app::run(config).await
}
