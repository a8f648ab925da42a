use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

use crate::pipeline::{MessageOutcome, PipelineObserver};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Ingest outcomes per message (success / error)
// - Dead letters by failure kind
// - Dependency reachability (database, kafka)
// - Cache hit / miss on the read path
// - HTTP request counts and latency
//
// Everything is registered on one Registry, scraped via GET /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingest
    pub kafka_messages_total: IntCounterVec,
    pub dead_letter_total: IntCounterVec,

    // Dependencies
    pub resource_up: IntGaugeVec,

    // Read path
    pub cache_lookups_total: IntCounterVec,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let kafka_messages_total = IntCounterVec::new(
            Opts::new("kafka_messages_total", "Inbound messages by processing status"),
            &["status"],
        )?;
        registry.register(Box::new(kafka_messages_total.clone()))?;

        let dead_letter_total = IntCounterVec::new(
            Opts::new("dead_letter_total", "Messages routed to the dead-letter topic"),
            &["kind"],
        )?;
        registry.register(Box::new(dead_letter_total.clone()))?;

        let resource_up = IntGaugeVec::new(
            Opts::new("resource_up", "Dependency reachability (1=up, 0=down)"),
            &["resource"],
        )?;
        registry.register(Box::new(resource_up.clone()))?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Order cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests served"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            kafka_messages_total,
            dead_letter_total,
            resource_up,
            cache_lookups_total,
            http_requests_total,
            http_request_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn set_resource_up(&self, resource: &str, up: bool) {
        self.resource_up.with_label_values(&[resource]).set(i64::from(up));
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

impl PipelineObserver for Metrics {
    fn message_processed(&self, outcome: &MessageOutcome) {
        self.kafka_messages_total
            .with_label_values(&[outcome.status()])
            .inc();

        if let MessageOutcome::DeadLettered { kind, .. } = outcome {
            self.dead_letter_total.with_label_values(&[kind.as_str()]).inc();
        }
    }

    fn cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }
}
