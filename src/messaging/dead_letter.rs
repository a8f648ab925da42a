use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

// ============================================================================
// Dead-Letter Sink
// ============================================================================
//
// Receives the original, unmodified bytes of a message the pipeline could
// not process, plus a human-readable reason. Publishing is best effort: the
// caller logs a failed publish and moves on, nothing retries it.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("dead-letter publish failed: {0}")]
    Publish(String),

    #[error("dead-letter publish refused: circuit breaker open")]
    CircuitOpen,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, payload: &[u8], reason: &str) -> Result<(), SinkError>;

    /// Flush anything buffered. Called once when the ingestor stops.
    async fn close(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub payload: Vec<u8>,
    pub reason: String,
}

/// Keeps every dead letter in memory. Can be told to fail publishes.
#[derive(Default)]
pub struct RecordingDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
    failing: AtomicBool,
    close_calls: AtomicUsize,
}

impl RecordingDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().await.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn send(&self, payload: &[u8], reason: &str) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Publish("simulated broker outage".to_string()));
        }

        self.letters.lock().await.push(DeadLetter {
            payload: payload.to_vec(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}
