use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    message::Message,
    topic_partition_list::{Offset, TopicPartitionList},
    types::RDKafkaErrorCode,
};
use tokio::sync::{mpsc, Mutex};

// ============================================================================
// Inbound Message Source
// ============================================================================
//
// Delivery policy: offsets are committed only after a message has been
// fully handled (ingested, acknowledged as a duplicate, or dead-lettered).
// A crash between handling and commit redelivers the message on restart,
// so consumption is at-least-once. With no committed offset for the group,
// reading starts at the newest record.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next record. `None` once the source is exhausted.
    async fn recv(&mut self) -> Option<Result<InboundMessage, SourceError>>;

    /// Mark `message` as handled so it is not redelivered.
    async fn ack(&mut self, message: &InboundMessage) -> Result<(), SourceError>;

    async fn close(&mut self);
}

pub struct KafkaOrderSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaOrderSource {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(&[topic])?;

        tracing::info!(topic = %topic, group_id = %group_id, "Kafka consumer subscribed");

        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaOrderSource {
    async fn recv(&mut self) -> Option<Result<InboundMessage, SourceError>> {
        let result = match self.consumer.recv().await {
            Ok(message) => Ok(InboundMessage {
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err(e) => Err(SourceError::from(e)),
        };
        Some(result)
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), SourceError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "Kafka consumer unsubscribed");
    }
}

/// Broker reachability check: fetch cluster metadata with a throwaway client.
pub async fn probe_brokers(brokers: &str, timeout: Duration) -> Result<(), KafkaError> {
    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .create()?;

    let probe = tokio::task::spawn_blocking(move || {
        consumer.fetch_metadata(None, timeout).map(|_| ())
    });

    match probe.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "Broker probe task failed");
            Err(KafkaError::MetadataFetch(RDKafkaErrorCode::Fail))
        }
    }
}

// ============================================================================
// Channel Source
// ============================================================================

/// In-process source fed through an mpsc channel. Offsets count up from 0
/// on a single partition; acknowledged offsets are recorded.
pub struct ChannelSource {
    receiver: mpsc::Receiver<Vec<u8>>,
    next_offset: i64,
    acked: Arc<Mutex<Vec<i64>>>,
    closed: Arc<Mutex<bool>>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            receiver,
            next_offset: 0,
            acked: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Shared view of acknowledged offsets, usable after the source moved.
    pub fn acked_handle(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.acked)
    }

    pub fn closed_handle(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Option<Result<InboundMessage, SourceError>> {
        let payload = self.receiver.recv().await?;
        let offset = self.next_offset;
        self.next_offset += 1;

        Some(Ok(InboundMessage {
            payload,
            topic: "channel".to_string(),
            partition: 0,
            offset,
        }))
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), SourceError> {
        self.acked.lock().await.push(message.offset);
        Ok(())
    }

    async fn close(&mut self) {
        self.receiver.close();
        *self.closed.lock().await = true;
    }
}
