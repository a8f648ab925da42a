use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::watch;

use super::outcome::{IngestError, MessageOutcome, NoopObserver, PipelineObserver};
use crate::cache::OrderCache;
use crate::domain::order::OrderValidator;
use crate::messaging::{DeadLetterSink, MessageSource};
use crate::models::Order;
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Order Ingestor
// ============================================================================
//
// Drains the inbound source one message at a time, in delivery order:
//
//   decode -> validate -> persist -> cache
//
// A failure at any of the first three steps sends the raw payload to the
// dead-letter sink and the loop moves on. A message is either persisted and
// cached, or dead-lettered; never both.
//
// Lifecycle: Idle -> Consuming -> Draining -> Stopped. A stop request lets
// the in-flight message finish, then closes the sink and the source, in
// that order.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestorState {
    Idle,
    Consuming,
    Draining,
    Stopped,
}

/// What to do when `order_uid` is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Treat like any other persistence failure.
    #[default]
    DeadLetter,
    /// Idempotent no-op: no dead letter, no cache write.
    Acknowledge,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dead-letter" | "dead_letter" | "deadletter" => Ok(DuplicatePolicy::DeadLetter),
            "acknowledge" | "ack" => Ok(DuplicatePolicy::Acknowledge),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

pub struct OrderIngestor {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    sink: Arc<dyn DeadLetterSink>,
    validator: OrderValidator,
    observer: Arc<dyn PipelineObserver>,
    duplicate_policy: DuplicatePolicy,
    state: watch::Sender<IngestorState>,
}

impl OrderIngestor {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn OrderCache>,
        sink: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let (state, _) = watch::channel(IngestorState::Idle);
        Self {
            store,
            cache,
            sink,
            validator: OrderValidator::new(),
            observer: Arc::new(NoopObserver),
            duplicate_policy: DuplicatePolicy::default(),
            state,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn state(&self) -> IngestorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<IngestorState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: IngestorState) {
        tracing::debug!(?state, "Ingestor state change");
        self.state.send_replace(state);
    }

    /// Consume `source` until it is exhausted or `shutdown` becomes true.
    pub async fn run<S: MessageSource>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) {
        self.set_state(IngestorState::Consuming);
        tracing::info!("🔄 Order ingestor consuming");

        loop {
            let next = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => {
                    tracing::info!("Stop requested, ingestor draining");
                    self.set_state(IngestorState::Draining);
                    break;
                }
                next = source.recv() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Consumer error");
                    continue;
                }
                None => {
                    tracing::info!("Message source exhausted");
                    self.set_state(IngestorState::Draining);
                    break;
                }
            };

            // The in-flight message always runs to completion; a stop
            // request arriving meanwhile only moves the state to Draining.
            let processing = self.process(&message.payload);
            tokio::pin!(processing);
            let mut draining = false;
            loop {
                tokio::select! {
                    _ = &mut processing => break,
                    _ = stop_requested(&mut shutdown), if !draining => {
                        draining = true;
                        self.set_state(IngestorState::Draining);
                    }
                }
            }

            if let Err(e) = source.ack(&message).await {
                tracing::warn!(
                    error = %e,
                    offset = message.offset,
                    partition = message.partition,
                    "Failed to commit offset"
                );
            }

            if draining {
                tracing::info!("In-flight message finished, ingestor stopping");
                break;
            }
        }

        self.sink.close().await;
        source.close().await;
        self.set_state(IngestorState::Stopped);
        tracing::info!("🛑 Order ingestor stopped");
    }

    /// Handle one raw message end to end. Never fails: every error ends in
    /// the dead-letter sink.
    pub async fn process(&self, payload: &[u8]) -> MessageOutcome {
        let outcome = match self.ingest(payload).await {
            Ok(order) => {
                let order_uid = order.order_uid.clone();
                self.cache.set(&order_uid, order).await;
                tracing::info!(order_uid = %order_uid, "✅ Order ingested");
                MessageOutcome::Ingested { order_uid }
            }
            Err(IngestError::Persistence(StoreError::Duplicate(order_uid)))
                if self.duplicate_policy == DuplicatePolicy::Acknowledge =>
            {
                tracing::info!(order_uid = %order_uid, "Duplicate order acknowledged");
                MessageOutcome::DuplicateAcknowledged { order_uid }
            }
            Err(e) => self.dead_letter(payload, e).await,
        };

        self.observer.message_processed(&outcome);
        outcome
    }

    async fn ingest(&self, payload: &[u8]) -> Result<Order, IngestError> {
        let order = Order::from_slice(payload)?;

        if let Err(e) = self.validator.validate(&order) {
            tracing::warn!(order_uid = %order.order_uid, error = %e, "Order failed validation");
            return Err(e.into());
        }

        self.store.save(&order).await?;
        Ok(order)
    }

    async fn dead_letter(&self, payload: &[u8], error: IngestError) -> MessageOutcome {
        let kind = error.kind();
        let reason = error.to_string();

        tracing::error!(kind = kind.as_str(), reason = %reason, "💀 Routing message to dead-letter topic");

        if let Err(e) = self.sink.send(payload, &reason).await {
            tracing::error!(error = %e, "FAILED to send message to dead-letter topic");
        }

        MessageOutcome::DeadLettered { kind, reason }
    }
}

/// Resolves once the stop flag is set or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordingCache;
    use crate::messaging::{ChannelSource, RecordingDeadLetterSink};
    use crate::models::fixtures::sample_order;
    use crate::pipeline::FailureKind;
    use crate::store::InMemoryOrderStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryOrderStore>,
        cache: Arc<RecordingCache>,
        sink: Arc<RecordingDeadLetterSink>,
        ingestor: OrderIngestor,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryOrderStore::new());
        let cache = Arc::new(RecordingCache::new());
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let ingestor = OrderIngestor::new(store.clone(), cache.clone(), sink.clone());
        Harness { store, cache, sink, ingestor }
    }

    fn payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap()
    }

    #[derive(Default)]
    struct CollectingObserver {
        outcomes: StdMutex<Vec<MessageOutcome>>,
    }

    impl PipelineObserver for CollectingObserver {
        fn message_processed(&self, outcome: &MessageOutcome) {
            self.outcomes.lock().unwrap().push(outcome.clone());
        }
    }

    #[tokio::test]
    async fn test_valid_message_is_persisted_then_cached() {
        let h = harness();
        let order = sample_order("uid-1");

        let outcome = h.ingestor.process(&payload(&order)).await;

        assert_eq!(outcome, MessageOutcome::Ingested { order_uid: "uid-1".into() });
        assert_eq!(h.store.get("uid-1").await.unwrap(), Some(order.clone()));
        assert_eq!(h.cache.get("uid-1").await, Some(order));
        assert!(h.sink.letters().await.is_empty());
    }

    #[tokio::test]
    async fn test_cached_copy_matches_store_precision() {
        let h = harness();
        let mut json = serde_json::to_value(sample_order("uid-ns")).unwrap();
        json["date_created"] = "2021-11-26T06:22:19.123456789Z".into();

        h.ingestor.process(&serde_json::to_vec(&json).unwrap()).await;

        let cached = h.cache.get("uid-ns").await.unwrap();
        assert_eq!(cached.date_created.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(h.store.get("uid-ns").await.unwrap(), Some(cached));
    }

    #[tokio::test]
    async fn test_decode_failure_isolation() {
        let h = harness();

        let outcome = h.ingestor.process(b"{invalid-json}").await;

        assert!(matches!(
            outcome,
            MessageOutcome::DeadLettered { kind: FailureKind::Decode, .. }
        ));
        assert_eq!(h.store.save_calls(), 0);
        assert_eq!(h.cache.set_calls(), 0);

        let letters = h.sink.letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].payload, b"{invalid-json}");
        assert!(letters[0].reason.starts_with("decode error"));
    }

    #[tokio::test]
    async fn test_validation_failure_isolation() {
        let h = harness();
        let mut order = sample_order("uid-1");
        order.order_uid.clear();
        let raw = payload(&order);

        let outcome = h.ingestor.process(&raw).await;

        assert!(matches!(
            outcome,
            MessageOutcome::DeadLettered { kind: FailureKind::Validation, .. }
        ));
        assert_eq!(h.store.save_calls(), 0);
        assert_eq!(h.cache.set_calls(), 0);

        let letters = h.sink.letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].payload, raw);
        assert_eq!(letters[0].reason, "validation error: order_uid");
    }

    #[tokio::test]
    async fn test_persistence_failure_isolation() {
        let h = harness();
        h.store.set_available(false);

        let outcome = h.ingestor.process(&payload(&sample_order("uid-1"))).await;

        assert!(matches!(
            outcome,
            MessageOutcome::DeadLettered { kind: FailureKind::Persistence, .. }
        ));
        assert_eq!(h.store.save_calls(), 1);
        assert_eq!(h.cache.set_calls(), 0);
        assert!(!h.cache.contains("uid-1").await);

        h.store.set_available(true);
        assert!(!h.store.contains("uid-1").await);

        let letters = h.sink.letters().await;
        assert_eq!(letters.len(), 1);
        assert!(letters[0].reason.starts_with("persistence error"));
    }

    #[tokio::test]
    async fn test_duplicate_is_dead_lettered_by_default() {
        let h = harness();
        let raw = payload(&sample_order("uid-1"));

        h.ingestor.process(&raw).await;
        let outcome = h.ingestor.process(&raw).await;

        assert!(matches!(
            outcome,
            MessageOutcome::DeadLettered { kind: FailureKind::Persistence, .. }
        ));
        assert_eq!(h.cache.set_calls(), 1);
        assert_eq!(h.sink.letters().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_acknowledged_when_configured() {
        let store = Arc::new(InMemoryOrderStore::new());
        let cache = Arc::new(RecordingCache::new());
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let ingestor = OrderIngestor::new(store.clone(), cache.clone(), sink.clone())
            .with_duplicate_policy(DuplicatePolicy::Acknowledge);
        let raw = payload(&sample_order("uid-1"));

        ingestor.process(&raw).await;
        let outcome = ingestor.process(&raw).await;

        assert_eq!(
            outcome,
            MessageOutcome::DuplicateAcknowledged { order_uid: "uid-1".into() }
        );
        assert_eq!(cache.set_calls(), 1);
        assert!(sink.letters().await.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_processing() {
        let h = harness();
        h.sink.set_failing(true);

        let failed = h.ingestor.process(b"not json").await;
        let ok = h.ingestor.process(&payload(&sample_order("uid-2"))).await;

        assert_eq!(failed.status(), "error");
        assert_eq!(ok.status(), "success");
        assert!(h.cache.contains("uid-2").await);
    }

    #[tokio::test]
    async fn test_observer_sees_every_outcome() {
        let store = Arc::new(InMemoryOrderStore::new());
        let observer = Arc::new(CollectingObserver::default());
        let ingestor = OrderIngestor::new(
            store,
            Arc::new(RecordingCache::new()),
            Arc::new(RecordingDeadLetterSink::new()),
        )
        .with_observer(observer.clone());

        ingestor.process(&payload(&sample_order("uid-1"))).await;
        ingestor.process(b"{").await;

        let statuses: Vec<_> = observer
            .outcomes
            .lock()
            .unwrap()
            .iter()
            .map(MessageOutcome::status)
            .collect();
        assert_eq!(statuses, vec!["success", "error"]);
    }

    #[tokio::test]
    async fn test_run_processes_in_order_and_acks_each_message() {
        let h = harness();
        let (tx, source) = ChannelSource::channel(8);
        let acked = source.acked_handle();
        let closed = source.closed_handle();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(payload(&sample_order("uid-1"))).await.unwrap();
        tx.send(b"garbage".to_vec()).await.unwrap();
        tx.send(payload(&sample_order("uid-2"))).await.unwrap();
        drop(tx);

        h.ingestor.run(source, shutdown_rx).await;

        assert_eq!(*acked.lock().await, vec![0, 1, 2]);
        assert!(*closed.lock().await);
        assert_eq!(h.sink.close_calls(), 1);
        assert_eq!(h.ingestor.state(), IngestorState::Stopped);
        assert!(h.cache.contains("uid-1").await);
        assert!(h.cache.contains("uid-2").await);
        assert_eq!(h.sink.letters().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_signal_ends_idle_loop() {
        let h = harness();
        let (_tx, source) = ChannelSource::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut states = h.ingestor.subscribe_state();

        let ingestor = Arc::new(h.ingestor);
        let runner = {
            let ingestor = ingestor.clone();
            tokio::spawn(async move { ingestor.run(source, shutdown_rx).await })
        };

        states.wait_for(|s| *s == IngestorState::Consuming).await.unwrap();
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("ingestor should stop")
            .unwrap();
        assert_eq!(ingestor.state(), IngestorState::Stopped);
    }

    /// Store whose `save` blocks until released, to hold a message in flight.
    struct GatedStore {
        inner: InMemoryOrderStore,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl OrderStore for GatedStore {
        async fn save(&self, order: &Order) -> Result<(), StoreError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.save(order).await
        }

        async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
            self.inner.get(order_uid).await
        }

        async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.get_all().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_in_flight_message_completes_after_stop() {
        let store = Arc::new(GatedStore {
            inner: InMemoryOrderStore::new(),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let cache = Arc::new(RecordingCache::new());
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let ingestor = Arc::new(OrderIngestor::new(store.clone(), cache.clone(), sink.clone()));
        let mut states = ingestor.subscribe_state();

        let (tx, source) = ChannelSource::channel(4);
        let acked = source.acked_handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(payload(&sample_order("in-flight"))).await.unwrap();
        tx.send(payload(&sample_order("never-started"))).await.unwrap();

        let runner = {
            let ingestor = ingestor.clone();
            tokio::spawn(async move { ingestor.run(source, shutdown_rx).await })
        };

        store.entered.notified().await;
        shutdown_tx.send(true).unwrap();
        states.wait_for(|s| *s == IngestorState::Draining).await.unwrap();
        store.release.notify_one();

        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("ingestor should stop")
            .unwrap();

        assert!(cache.contains("in-flight").await);
        assert!(!cache.contains("never-started").await);
        assert_eq!(*acked.lock().await, vec![0]);
        assert_eq!(ingestor.state(), IngestorState::Stopped);
    }

    #[test]
    fn test_duplicate_policy_parsing() {
        assert_eq!("dead-letter".parse(), Ok(DuplicatePolicy::DeadLetter));
        assert_eq!("Acknowledge".parse(), Ok(DuplicatePolicy::Acknowledge));
        assert!("ignore".parse::<DuplicatePolicy>().is_err());
    }
}
