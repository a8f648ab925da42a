use std::sync::Arc;
use std::time::Duration;

use kameo::Actor;
use tokio::sync::watch;

use crate::cache::{OrderCache, TtlCache};
use crate::config::Config;
use crate::health::{BrokerProbe, DeadLetterProbe, HealthChecker, HealthMonitorActor, StoreProbe};
use crate::http::{build_server, AppState};
use crate::messaging::{DeadLetterSink, KafkaOrderSource, RedpandaDeadLetterSink};
use crate::metrics::Metrics;
use crate::pipeline::{OrderIngestor, OrderQueryService};
use crate::store::{OrderStore, PostgresOrderStore};

const BROKER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bring every component up, serve until Ctrl-C, then shut down in order:
/// HTTP server, ingestor (drains its in-flight message), background tasks,
/// database pool.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Durable store (fatal if the retry budget runs out) ===
    let postgres = Arc::new(
        PostgresOrderStore::connect_with_retry(
            &config.database.url,
            config.database.max_connections,
            config.database.max_retries,
            config.database.retry_delay,
        )
        .await?,
    );
    let store: Arc<dyn OrderStore> = postgres.clone();

    // === 3. Cache, warmed from the store ===
    let ttl_cache = Arc::new(TtlCache::new(config.cache.ttl));
    let cache: Arc<dyn OrderCache> = ttl_cache.clone();

    let query = Arc::new(
        OrderQueryService::new(cache.clone(), store.clone()).with_observer(metrics.clone()),
    );
    if let Err(e) = query.warm_cache().await {
        tracing::warn!(error = %e, "Cache warm-up failed, starting cold");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ttl_cache.spawn_sweeper(config.cache.cleanup_interval, shutdown_rx.clone());

    // === 4. Dead-letter producer ===
    let dead_letters = Arc::new(RedpandaDeadLetterSink::new(
        &config.kafka.brokers,
        &config.kafka.dlq_topic,
    )?);

    // === 5. Health monitoring ===
    let monitor = HealthMonitorActor::spawn(HealthMonitorActor::new());
    let checker = HealthChecker::new(monitor.clone(), metrics.clone())
        .with_probe(StoreProbe::new(store.clone()))
        .with_probe(BrokerProbe::new(config.kafka.brokers.clone(), BROKER_PROBE_TIMEOUT))
        .with_probe(DeadLetterProbe::new(dead_letters.clone()))
        .spawn(config.health_check_interval, shutdown_rx.clone());

    // === 6. Ingestor ===
    let sink: Arc<dyn DeadLetterSink> = dead_letters;
    let source = KafkaOrderSource::new(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &config.kafka.topic,
    )?;

    let ingestor = Arc::new(
        OrderIngestor::new(store.clone(), cache.clone(), sink)
            .with_observer(metrics.clone())
            .with_duplicate_policy(config.duplicate_policy),
    );
    let ingest_task = {
        let ingestor = ingestor.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { ingestor.run(source, shutdown).await })
    };

    // === 7. HTTP ===
    let server = build_server(
        AppState {
            query,
            metrics: metrics.clone(),
            health: monitor,
        },
        &config.server.host,
        config.server.port,
    )?;
    let server_handle = server.handle();
    let mut server_task = actix_web::rt::spawn(server);

    tracing::info!("✅ Order pipeline running");

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("🛑 Shutdown requested");
            server_handle.stop(true).await;
        }
    }

    // === 8. Shutdown ===
    shutdown_tx.send_replace(true);

    if let Err(e) = ingest_task.await {
        tracing::error!(error = %e, "Ingestor task failed");
    }
    for (name, task) in [("cache sweeper", sweeper), ("health checker", checker)] {
        if let Err(e) = task.await {
            tracing::warn!(task = name, error = %e, "Background task failed");
        }
    }

    postgres.close().await;
    tracing::info!(state = ?ingestor.state(), "👋 Shutdown complete");

    Ok(())
}
