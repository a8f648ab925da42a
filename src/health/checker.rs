use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kameo::actor::ActorRef;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::monitor::{HealthMonitorActor, UpdateHealth};
use super::status::HealthStatus;
use crate::messaging::{probe_brokers, RedpandaDeadLetterSink};
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::CircuitState;

pub const DATABASE: &str = "database";
pub const KAFKA: &str = "kafka";
pub const DEAD_LETTER: &str = "dead_letter";

/// One dependency the checker polls.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &'static str;

    async fn check(&self) -> HealthStatus;
}

/// `SELECT 1` against the order store.
pub struct StoreProbe {
    store: Arc<dyn OrderStore>,
}

impl StoreProbe {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthProbe for StoreProbe {
    fn component(&self) -> &'static str {
        DATABASE
    }

    async fn check(&self) -> HealthStatus {
        match self.store.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}

/// Cluster metadata fetch against the brokers.
pub struct BrokerProbe {
    brokers: String,
    timeout: Duration,
}

impl BrokerProbe {
    pub fn new(brokers: impl Into<String>, timeout: Duration) -> Self {
        Self {
            brokers: brokers.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for BrokerProbe {
    fn component(&self) -> &'static str {
        KAFKA
    }

    async fn check(&self) -> HealthStatus {
        match probe_brokers(&self.brokers, self.timeout).await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}

/// Circuit breaker state of the dead-letter producer.
pub struct DeadLetterProbe {
    sink: Arc<RedpandaDeadLetterSink>,
}

impl DeadLetterProbe {
    pub fn new(sink: Arc<RedpandaDeadLetterSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl HealthProbe for DeadLetterProbe {
    fn component(&self) -> &'static str {
        DEAD_LETTER
    }

    async fn check(&self) -> HealthStatus {
        match self.sink.circuit_state().await {
            CircuitState::Closed => HealthStatus::Healthy,
            state @ CircuitState::HalfOpen => {
                HealthStatus::Degraded(format!("circuit breaker {}", state.as_str()))
            }
            state @ CircuitState::Open => {
                HealthStatus::Unhealthy(format!("circuit breaker {}", state.as_str()))
            }
        }
    }
}

/// Polls every probe on a fixed interval, reports to the monitor actor and
/// mirrors the result into the `resource_up` gauge.
pub struct HealthChecker {
    probes: Vec<Box<dyn HealthProbe>>,
    monitor: ActorRef<HealthMonitorActor>,
    metrics: Arc<Metrics>,
}

impl HealthChecker {
    pub fn new(monitor: ActorRef<HealthMonitorActor>, metrics: Arc<Metrics>) -> Self {
        Self {
            probes: Vec::new(),
            monitor,
            metrics,
        }
    }

    pub fn with_probe(mut self, probe: impl HealthProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub async fn check_once(&self) {
        for probe in &self.probes {
            let component = probe.component();
            let status = probe.check().await;

            self.metrics.set_resource_up(component, status.is_healthy());

            let reported = self
                .monitor
                .tell(UpdateHealth {
                    component: component.to_string(),
                    status,
                })
                .send()
                .await;
            if reported.is_err() {
                tracing::warn!(component, "Health monitor unreachable");
            }
        }
    }

    /// First check runs immediately, then every `interval` until `shutdown`
    /// flips to true.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.check_once().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Health checker stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
