use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};

use super::dead_letter::{DeadLetterSink, SinkError};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

/// Header carrying the failure reason on every dead-lettered record.
pub const ERROR_HEADER: &str = "error";

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes dead letters to a Kafka/Redpanda topic.
///
/// The payload is forwarded byte for byte; the reason travels in the
/// `error` header only.
pub struct RedpandaDeadLetterSink {
    producer: FutureProducer,
    topic: String,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaDeadLetterSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            success_threshold: 1,
        };

        Ok(Self {
            producer,
            topic: topic.to_string(),
            circuit_breaker: CircuitBreaker::new(cb_config),
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }
}

#[async_trait]
impl DeadLetterSink for RedpandaDeadLetterSink {
    async fn send(&self, payload: &[u8], reason: &str) -> Result<(), SinkError> {
        let result = self
            .circuit_breaker
            .call(async {
                let headers = OwnedHeaders::new().insert(Header {
                    key: ERROR_HEADER,
                    value: Some(reason),
                });
                let record = FutureRecord::<(), [u8]>::to(&self.topic)
                    .payload(payload)
                    .headers(headers);

                self.producer
                    .send(record, Timeout::After(SEND_TIMEOUT))
                    .await
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(delivery) => {
                tracing::info!(
                    topic = %self.topic,
                    ?delivery,
                    reason = %reason,
                    "Message sent to dead-letter topic"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %self.topic, "Circuit breaker open - dead-letter topic unavailable");
                Err(SinkError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %self.topic, "Failed to publish dead letter");
                Err(SinkError::Publish(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        let producer = self.producer.clone();
        let flushed =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT))).await;

        match flushed {
            Ok(Ok(())) => tracing::info!(topic = %self.topic, "Dead-letter producer flushed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Dead-letter producer flush failed"),
            Err(e) => tracing::warn!(error = %e, "Dead-letter flush task failed"),
        }
    }
}
