use crate::domain::order::ValidationError;
use crate::store::StoreError;

// ============================================================================
// Per-Message Outcomes and Errors
// ============================================================================

/// Terminal failure for one message. Never retried, never escapes the
/// ingest loop; the Display text is the dead-letter reason.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::Decode(_) => FailureKind::Decode,
            IngestError::Validation(_) => FailureKind::Validation,
            IngestError::Persistence(_) => FailureKind::Persistence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Decode,
    Validation,
    Persistence,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Decode => "decode",
            FailureKind::Validation => "validation",
            FailureKind::Persistence => "persistence",
        }
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Persisted and cached.
    Ingested { order_uid: String },
    /// Identity already stored; acknowledged without side effects.
    DuplicateAcknowledged { order_uid: String },
    /// Routed to the dead-letter sink (or attempted, if the sink failed).
    DeadLettered { kind: FailureKind, reason: String },
}

impl MessageOutcome {
    /// The `status` label: "success" or "error".
    pub fn status(&self) -> &'static str {
        match self {
            MessageOutcome::Ingested { .. } | MessageOutcome::DuplicateAcknowledged { .. } => {
                "success"
            }
            MessageOutcome::DeadLettered { .. } => "error",
        }
    }
}

/// Receives the named signals the pipeline emits. Metrics exporters and
/// tests subscribe by implementing it.
pub trait PipelineObserver: Send + Sync {
    fn message_processed(&self, _outcome: &MessageOutcome) {}

    fn cache_lookup(&self, _hit: bool) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
