// ============================================================================
// Order Pipeline
// ============================================================================
//
// Write path: OrderIngestor (source -> decode -> validate -> store -> cache,
// failures to the dead-letter sink).
// Read path: OrderQueryService (cache-aside over the store).
//
// Both depend only on the capability traits in cache/, store/ and
// messaging/, so any backend can be swapped in.
//
// ============================================================================

mod ingestor;
mod outcome;
mod query;

pub use ingestor::{DuplicatePolicy, IngestorState, OrderIngestor};
pub use outcome::{FailureKind, IngestError, MessageOutcome, NoopObserver, PipelineObserver};
pub use query::OrderQueryService;
