// ============================================================================
// Messaging
// ============================================================================
//
// - consumer/    - inbound order records (Kafka consumer, channel double)
// - dead_letter/ - sink contract and in-memory double
// - redpanda/    - dead-letter producer over rdkafka
//
// ============================================================================

mod consumer;
mod dead_letter;
mod redpanda;

pub use consumer::{
    probe_brokers, ChannelSource, InboundMessage, KafkaOrderSource, MessageSource, SourceError,
};
pub use dead_letter::{DeadLetter, DeadLetterSink, RecordingDeadLetterSink, SinkError};
pub use redpanda::{RedpandaDeadLetterSink, ERROR_HEADER};
