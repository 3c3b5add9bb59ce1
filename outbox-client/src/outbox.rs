//! Outbox - the offline action queue and its sync engine.
//!
//! This module provides [`Outbox`], the API applications use to record
//! mutations while offline and replay them once connectivity returns.
//!
//! # Architecture
//!
//! The outbox uses the pure queue and retry state machine from outbox-core
//! and interprets their effects against the store and the executor table.
//!
//! ```text
//! Application → Outbox → ExecutorTable → Network
//!                 ↓  ↑
//!        KeyValueStore  ConnectivityMonitor
//!                 ↓
//!        outbox-core (queue + retry state machine)
//! ```
//!
//! Every queue mutation is persisted before the lock guarding the queue is
//! released, so the stored blob never lags the in-memory queue by more than
//! one synchronous step. Delivery is at-least-once: a crash between a
//! successful remote apply and the persisted removal replays that action
//! on the next start.
//!
//! # Example
//!
//! ```ignore
//! let monitor = Arc::new(ConnectivityMonitor::new(false));
//! let outbox = Outbox::new(&config, FileStore::new(dir, "offline-action-queue"), executors, monitor.clone());
//!
//! let id = outbox.update_entity("bot1", json!({"name": "X"}));
//! assert_eq!(outbox.pending_count(), 1);
//!
//! monitor.set_online(true); // drains in the background
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use outbox_core::{ActionQueue, ActionState, ApplyEvent, Effect, Outcome, RetryPolicy};
use outbox_types::{decode_queue, encode_queue, ActionId, ActionKind, QueuedAction};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::config::OutboxConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::executor::ExecutorTable;
use crate::store::KeyValueStore;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboxEvent {
    /// An action was added to the queue.
    Enqueued {
        /// The new action.
        id: ActionId,
        /// Its kind.
        kind: ActionKind,
    },
    /// An action was applied remotely and removed.
    Applied {
        /// The applied action.
        id: ActionId,
        /// Its kind.
        kind: ActionKind,
    },
    /// An apply attempt failed; the action stays queued.
    RetryScheduled {
        /// The failed action.
        id: ActionId,
        /// Its kind.
        kind: ActionKind,
        /// Failed attempts so far.
        retry_count: u32,
        /// Error from the last attempt.
        error: String,
    },
    /// An action exhausted its retries and was abandoned.
    Dropped(DroppedAction),
    /// The queue was cleared by the user.
    Cleared {
        /// Number of actions discarded.
        removed: usize,
    },
}

/// An action abandoned after exhausting its retries.
///
/// Carries enough detail for a one-time "your offline edit was lost"
/// notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedAction {
    /// The abandoned action.
    pub id: ActionId,
    /// Which mutation was lost.
    pub kind: ActionKind,
    /// The payload that was never applied.
    pub payload: Value,
    /// Failed attempts at the time of the drop.
    pub retry_count: u32,
    /// Why the action was dropped.
    pub reason: String,
}

/// Why a drain returned without attempting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Connectivity monitor reports offline.
    Offline,
    /// Another drain pass is running.
    AlreadyDraining,
    /// Nothing queued.
    Empty,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Set when the pass was a no-op.
    pub skipped: Option<SkipReason>,
    /// Actions applied and removed, in processing order.
    pub applied: Vec<ActionId>,
    /// Actions that failed and stay queued.
    pub retried: Vec<ActionId>,
    /// Actions dropped after their last failure.
    pub dropped: Vec<DroppedAction>,
}

impl DrainReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Check if the pass was a no-op.
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Number of actions the pass reported an outcome for.
    pub fn attempted(&self) -> usize {
        self.applied.len() + self.retried.len() + self.dropped.len()
    }
}

/// Offline action queue with write-through persistence and a sync engine.
///
/// Cheap to clone; clones share one queue. Construct one per application
/// and hand clones to whatever needs pending-count visibility.
pub struct Outbox<S: KeyValueStore + 'static> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    queue: Mutex<ActionQueue>,
    store: S,
    executors: ExecutorTable,
    monitor: Arc<ConnectivityMonitor>,
    policy: RetryPolicy,
    apply_timeout: Duration,
    drain_on_enqueue: bool,
    draining: AtomicBool,
    events: broadcast::Sender<OutboxEvent>,
}

impl<S: KeyValueStore + 'static> Clone for Outbox<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore + 'static> Outbox<S> {
    /// Create an outbox, restoring any queue persisted by a previous run.
    ///
    /// Never fails: an unreadable or corrupted blob is logged and the queue
    /// starts empty. Registers the drain trigger on `monitor`.
    pub fn new(
        config: &OutboxConfig,
        store: S,
        executors: ExecutorTable,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let queue = load_queue(&store);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(Inner {
            queue: Mutex::new(queue),
            store,
            executors,
            monitor: Arc::clone(&monitor),
            policy: config.retry_policy(),
            apply_timeout: config.apply_timeout(),
            drain_on_enqueue: config.sync.drain_on_enqueue,
            draining: AtomicBool::new(false),
            events,
        });

        let weak = Arc::downgrade(&inner);
        monitor.on_online(move || spawn_drain(&weak));

        Self { inner }
    }

    /// Add an action to the queue and return its id.
    ///
    /// Never fails. If the store rejects the write the action still lives in
    /// memory for this session; the next successful mutation persists it.
    /// When online, a drain is started in the background.
    pub fn enqueue(&self, kind: ActionKind, payload: Value) -> ActionId {
        let id = {
            let mut queue = self.inner.lock_queue();
            let id = queue.enqueue(kind, payload);
            self.inner.persist(&queue);
            id
        };

        tracing::debug!(action_id = %id, %kind, "action queued");
        self.inner.emit(OutboxEvent::Enqueued { id, kind });

        if self.inner.drain_on_enqueue && self.inner.monitor.is_online() {
            spawn_drain(&Arc::downgrade(&self.inner));
        }

        id
    }

    /// Queue creation of an entity.
    pub fn create_entity(&self, data: Value) -> ActionId {
        self.enqueue(ActionKind::CreateEntity, data)
    }

    /// Queue an update of entity `id`.
    ///
    /// Object-shaped `changes` are sent flat with `id` added, e.g.
    /// `{"id": "bot1", "name": "X"}`; anything else is wrapped as
    /// `{"id": .., "changes": ..}`.
    pub fn update_entity(&self, id: &str, changes: Value) -> ActionId {
        let payload = match changes {
            Value::Object(mut fields) => {
                fields.insert("id".to_string(), Value::String(id.to_string()));
                Value::Object(fields)
            }
            other => json!({ "id": id, "changes": other }),
        };
        self.enqueue(ActionKind::UpdateEntity, payload)
    }

    /// Queue deletion of entity `id`.
    pub fn delete_entity(&self, id: &str) -> ActionId {
        self.enqueue(ActionKind::DeleteEntity, json!({ "id": id }))
    }

    /// Queue a message to entity `entity_id`.
    pub fn send_message(&self, entity_id: &str, message: Value) -> ActionId {
        self.enqueue(
            ActionKind::SendMessage,
            json!({ "entityId": entity_id, "message": message }),
        )
    }

    /// Ordered copy of every pending action.
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.inner.lock_queue().snapshot()
    }

    /// Number of pending actions.
    pub fn pending_count(&self) -> usize {
        self.inner.lock_queue().len()
    }

    /// Remove a pending action by id. Returns false if it was not queued.
    pub fn remove(&self, id: &ActionId) -> bool {
        self.inner.remove_and_persist(id)
    }

    /// Discard every pending action. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut queue = self.inner.lock_queue();
            let removed = queue.clear();
            self.inner.persist(&queue);
            removed
        };

        tracing::info!(removed, "action queue cleared");
        self.inner.emit(OutboxEvent::Cleared { removed });
        removed
    }

    /// Subscribe to queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboxEvent> {
        self.inner.events.subscribe()
    }

    /// Check if a drain pass is running.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// The connectivity monitor driving this outbox.
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.monitor
    }

    /// Get a reference to the underlying store (for testing).
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Run one drain pass.
    ///
    /// No-op when offline, when another pass is running, or when the queue
    /// is empty. Otherwise every action in a snapshot taken at the start is
    /// attempted once, in order; one failing action never blocks the ones
    /// behind it. Actions enqueued during the pass wait for the next trigger.
    pub async fn drain(&self) -> DrainReport {
        self.inner.drain().await
    }
}

impl<S: KeyValueStore + 'static> Inner<S> {
    fn lock_queue(&self) -> MutexGuard<'_, ActionQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the queue through to the store. Failures are logged, not raised.
    fn persist(&self, queue: &ActionQueue) -> bool {
        let blob = match encode_queue(&queue.snapshot()) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize action queue");
                return false;
            }
        };

        match self.store.save(&blob) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, pending = queue.len(), "failed to persist action queue");
                false
            }
        }
    }

    fn emit(&self, event: OutboxEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn drain(&self) -> DrainReport {
        if !self.monitor.is_online() {
            tracing::debug!("drain skipped: offline");
            return DrainReport::skipped(SkipReason::Offline);
        }

        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("drain skipped: already draining");
            return DrainReport::skipped(SkipReason::AlreadyDraining);
        };

        let snapshot = self.lock_queue().snapshot();
        if snapshot.is_empty() {
            return DrainReport::skipped(SkipReason::Empty);
        }

        tracing::info!(pending = snapshot.len(), "draining action queue");
        let mut report = DrainReport::default();

        for action in snapshot {
            self.process(action, &mut report).await;
        }

        tracing::info!(
            applied = report.applied.len(),
            retried = report.retried.len(),
            dropped = report.dropped.len(),
            "drain finished"
        );
        report
    }

    async fn process(&self, action: QueuedAction, report: &mut DrainReport) {
        // The live count may differ from the snapshot if the queue changed
        let live_retry_count = self.lock_queue().get(&action.id).map(|a| a.retry_count);
        let Some(retry_count) = live_retry_count else {
            tracing::debug!(action_id = %action.id, "action left the queue mid-drain, skipping");
            return;
        };

        let event = match self.executors.dispatch(&action, self.apply_timeout).await {
            Ok(()) => ApplyEvent::Applied,
            Err(e) => ApplyEvent::Failed {
                error: e.to_string(),
            },
        };

        let (_state, effects) = ActionState::pending(retry_count).on_event(event, &self.policy);

        // Outcomes are only reported for actions the queue still owned
        let mut still_queued = true;
        for effect in effects {
            match effect {
                Effect::Remove => still_queued = self.remove_and_persist(&action.id),
                Effect::PersistRetryCount { retry_count } => {
                    still_queued = self.store_retry_count(&action.id, retry_count);
                }
                Effect::Report(outcome) if still_queued => self.report(&action, outcome, report),
                Effect::Report(_) => {
                    tracing::debug!(
                        action_id = %action.id,
                        "action left the queue during its apply, outcome discarded"
                    );
                }
            }
        }
    }

    fn remove_and_persist(&self, id: &ActionId) -> bool {
        let mut queue = self.lock_queue();
        let removed = queue.remove(id).is_some();
        if removed {
            self.persist(&queue);
        }
        removed
    }

    fn store_retry_count(&self, id: &ActionId, retry_count: u32) -> bool {
        let mut queue = self.lock_queue();
        let updated = queue.set_retry_count(id, retry_count);
        if updated {
            self.persist(&queue);
        }
        updated
    }

    fn report(&self, action: &QueuedAction, outcome: Outcome, report: &mut DrainReport) {
        match outcome {
            Outcome::Applied => {
                tracing::debug!(action_id = %action.id, kind = %action.kind, "action applied");
                report.applied.push(action.id);
                self.emit(OutboxEvent::Applied {
                    id: action.id,
                    kind: action.kind,
                });
            }
            Outcome::RetryScheduled { retry_count, error } => {
                tracing::info!(
                    action_id = %action.id,
                    kind = %action.kind,
                    retry_count,
                    error = %error,
                    "action failed, will retry"
                );
                report.retried.push(action.id);
                self.emit(OutboxEvent::RetryScheduled {
                    id: action.id,
                    kind: action.kind,
                    retry_count,
                    error,
                });
            }
            Outcome::Dropped { retry_count, reason } => {
                tracing::warn!(
                    action_id = %action.id,
                    kind = %action.kind,
                    retry_count,
                    reason = %reason,
                    "action abandoned"
                );
                let dropped = DroppedAction {
                    id: action.id,
                    kind: action.kind,
                    payload: action.payload.clone(),
                    retry_count,
                    reason,
                };
                report.dropped.push(dropped.clone());
                self.emit(OutboxEvent::Dropped(dropped));
            }
        }
    }
}

/// Clears the in-progress flag when dropped, even on unwind.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Fire-and-forget drain on the current tokio runtime.
fn spawn_drain<S: KeyValueStore + 'static>(inner: &Weak<Inner<S>>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                inner.drain().await;
            });
        }
        Err(_) => {
            tracing::warn!("no async runtime available, drain deferred to next trigger");
        }
    }
}

fn load_queue<S: KeyValueStore>(store: &S) -> ActionQueue {
    match store.load() {
        Ok(Some(blob)) => match decode_queue(&blob) {
            Ok(actions) => {
                tracing::info!(pending = actions.len(), "restored action queue");
                ActionQueue::from_actions(actions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted action queue is corrupted, starting empty");
                ActionQueue::new()
            }
        },
        Ok(None) => {
            tracing::debug!("no persisted action queue, starting empty");
            ActionQueue::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not load action queue, starting empty");
            ActionQueue::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockHandler;
    use crate::store::MemoryStore;

    fn test_config() -> OutboxConfig {
        OutboxConfig::default()
            .with_drain_on_enqueue(false)
            .with_apply_timeout(Duration::from_secs(5))
    }

    fn outbox_with(
        handler: MockHandler,
        online: bool,
    ) -> (Outbox<MemoryStore>, MemoryStore, Arc<ConnectivityMonitor>) {
        let store = MemoryStore::new();
        let monitor = Arc::new(ConnectivityMonitor::new(online));
        let outbox = Outbox::new(
            &test_config(),
            store.clone(),
            ExecutorTable::uniform(handler),
            Arc::clone(&monitor),
        );
        (outbox, store, monitor)
    }

    fn persisted(store: &MemoryStore) -> Vec<QueuedAction> {
        decode_queue(&store.blob().unwrap()).unwrap()
    }

    fn drain_events(rx: &mut broadcast::Receiver<OutboxEvent>) -> Vec<OutboxEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_for_empty(outbox: &Outbox<MemoryStore>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while outbox.pending_count() > 0 || outbox.is_draining() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue should drain");
    }

    // ===========================================
    // Queue Tests
    // ===========================================

    #[tokio::test]
    async fn offline_enqueue_keeps_order() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);

        let ids = vec![
            outbox.create_entity(json!({"name": "a"})),
            outbox.update_entity("bot1", json!({"name": "b"})),
            outbox.delete_entity("bot2"),
            outbox.send_message("bot1", json!("hello")),
        ];

        let snapshot_ids: Vec<_> = outbox.snapshot().iter().map(|a| a.id).collect();
        assert_eq!(snapshot_ids, ids);
        assert_eq!(outbox.pending_count(), 4);

        let persisted_ids: Vec<_> = persisted(&store).iter().map(|a| a.id).collect();
        assert_eq!(persisted_ids, ids);
    }

    #[tokio::test]
    async fn enqueue_persists_every_append() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);

        outbox.create_entity(json!({}));
        outbox.create_entity(json!({}));

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(decode_queue(&history[0]).unwrap().len(), 1);
        assert_eq!(decode_queue(&history[1]).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn enqueued_id_present_until_removed() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);

        let id = outbox.delete_entity("bot1");
        assert!(outbox.snapshot().iter().any(|a| a.id == id));

        assert!(outbox.remove(&id));
        assert!(!outbox.snapshot().iter().any(|a| a.id == id));
        assert!(persisted(&store).is_empty());

        // Second removal is a no-op
        assert!(!outbox.remove(&id));
    }

    #[tokio::test]
    async fn helper_payload_shapes() {
        let (outbox, _, _) = outbox_with(MockHandler::new(), false);

        outbox.update_entity("bot1", json!({"name": "X"}));
        outbox.update_entity("bot2", json!(42));
        outbox.delete_entity("bot3");
        outbox.send_message("bot1", json!({"text": "hi"}));

        let snapshot = outbox.snapshot();
        assert_eq!(snapshot[0].payload, json!({"id": "bot1", "name": "X"}));
        assert_eq!(snapshot[1].payload, json!({"id": "bot2", "changes": 42}));
        assert_eq!(snapshot[2].payload, json!({"id": "bot3"}));
        assert_eq!(
            snapshot[3].payload,
            json!({"entityId": "bot1", "message": {"text": "hi"}})
        );
        assert_eq!(snapshot[3].kind, ActionKind::SendMessage);
    }

    #[tokio::test]
    async fn clear_empties_queue_and_store() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);
        let mut events = outbox.subscribe();

        outbox.create_entity(json!({}));
        outbox.create_entity(json!({}));

        assert_eq!(outbox.clear(), 2);
        assert!(outbox.snapshot().is_empty());
        assert_eq!(store.blob().as_deref(), Some("[]"));
        assert!(drain_events(&mut events).contains(&OutboxEvent::Cleared { removed: 2 }));
    }

    #[tokio::test]
    async fn persistence_failure_keeps_action_in_memory() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);
        store.fail_next_save("quota exceeded");

        let id = outbox.create_entity(json!({"name": "a"}));

        assert_eq!(outbox.pending_count(), 1);
        assert_eq!(store.blob(), None);

        // Next mutation writes both actions
        outbox.create_entity(json!({"name": "b"}));
        let restored = persisted(&store);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].id, id);
    }

    // ===========================================
    // Restore Tests
    // ===========================================

    #[tokio::test]
    async fn restart_restores_pending_actions() {
        let (outbox, store, _) = outbox_with(MockHandler::new(), false);
        outbox.create_entity(json!({"name": "a"}));
        outbox.update_entity("bot1", json!({"name": "X"}));
        let before = outbox.snapshot();
        drop(outbox);

        let reloaded = Outbox::new(
            &test_config(),
            store.clone(),
            ExecutorTable::new(),
            Arc::new(ConnectivityMonitor::new(false)),
        );

        assert_eq!(reloaded.snapshot(), before);
    }

    #[tokio::test]
    async fn corrupted_blob_starts_empty() {
        let store = MemoryStore::with_blob("{definitely not a queue");
        let outbox = Outbox::new(
            &test_config(),
            store,
            ExecutorTable::new(),
            Arc::new(ConnectivityMonitor::new(false)),
        );

        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_store_starts_empty() {
        let store = MemoryStore::with_blob("[]");
        store.fail_next_load("permission denied");

        let outbox = Outbox::new(
            &test_config(),
            store.clone(),
            ExecutorTable::new(),
            Arc::new(ConnectivityMonitor::new(false)),
        );

        assert_eq!(outbox.pending_count(), 0);
        outbox.create_entity(json!({}));
        assert_eq!(persisted(&store).len(), 1);
    }

    // ===========================================
    // Drain Tests
    // ===========================================

    #[tokio::test]
    async fn drain_offline_is_no_op() {
        let handler = MockHandler::new();
        let (outbox, _, _) = outbox_with(handler.clone(), false);
        outbox.create_entity(json!({}));

        let report = outbox.drain().await;

        assert_eq!(report.skipped, Some(SkipReason::Offline));
        assert_eq!(handler.call_count(), 0);
        assert_eq!(outbox.pending_count(), 1);
    }

    #[tokio::test]
    async fn drain_empty_is_no_op() {
        let (outbox, _, _) = outbox_with(MockHandler::new(), true);

        let report = outbox.drain().await;

        assert_eq!(report.skipped, Some(SkipReason::Empty));
        assert!(!outbox.is_draining());
    }

    #[tokio::test]
    async fn drain_applies_in_order_and_empties_queue() {
        let handler = MockHandler::new();
        let (outbox, store, _) = outbox_with(handler.clone(), true);

        let ids: Vec<_> = (0..5)
            .map(|i| outbox.create_entity(json!({ "seq": i })))
            .collect();

        let report = outbox.drain().await;

        assert_eq!(report.applied, ids);
        assert_eq!(handler.called_ids(), ids);
        assert_eq!(outbox.pending_count(), 0);
        assert!(persisted(&store).is_empty());
    }

    #[tokio::test]
    async fn online_transition_drains_pending_actions() {
        let handler = MockHandler::new();
        let (outbox, _, monitor) = outbox_with(handler.clone(), false);

        let ids: Vec<_> = (0..3)
            .map(|i| outbox.send_message("bot1", json!(i)))
            .collect();
        assert_eq!(handler.call_count(), 0);

        monitor.set_online(true);
        wait_for_empty(&outbox).await;

        assert_eq!(handler.called_ids(), ids);
    }

    #[tokio::test]
    async fn enqueue_while_online_drains_immediately() {
        let handler = MockHandler::new();
        let store = MemoryStore::new();
        let outbox = Outbox::new(
            &OutboxConfig::default(),
            store,
            ExecutorTable::uniform(handler.clone()),
            Arc::new(ConnectivityMonitor::new(true)),
        );

        let id = outbox.delete_entity("bot1");
        wait_for_empty(&outbox).await;

        assert_eq!(handler.called_ids(), vec![id]);
    }

    #[tokio::test]
    async fn update_scenario_offline_then_online() {
        let handler = MockHandler::new();
        let executors = ExecutorTable::new().register(ActionKind::UpdateEntity, handler.clone());
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let outbox = Outbox::new(
            &test_config(),
            MemoryStore::new(),
            executors,
            Arc::clone(&monitor),
        );

        outbox.enqueue(ActionKind::UpdateEntity, json!({"id": "bot1", "name": "X"}));
        assert_eq!(outbox.snapshot().len(), 1);

        monitor.set_online(true);
        wait_for_empty(&outbox).await;

        assert_eq!(outbox.snapshot().len(), 0);
        assert_eq!(handler.calls()[0].payload, json!({"id": "bot1", "name": "X"}));
    }

    #[tokio::test]
    async fn always_failing_action_is_dropped_after_three_passes() {
        let handler = MockHandler::failing("HTTP 503");
        let (outbox, store, _) = outbox_with(handler.clone(), true);
        let mut events = outbox.subscribe();
        let id = outbox.create_entity(json!({"name": "doomed"}));

        outbox.drain().await;
        assert_eq!(persisted(&store)[0].retry_count, 1);
        assert_eq!(outbox.snapshot()[0].retry_count, 1);

        outbox.drain().await;
        assert_eq!(persisted(&store)[0].retry_count, 2);

        let report = outbox.drain().await;
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].id, id);
        assert_eq!(report.dropped[0].retry_count, 3);
        assert!(report.dropped[0].reason.contains("HTTP 503"));

        assert_eq!(outbox.pending_count(), 0);
        assert!(persisted(&store).is_empty());
        assert_eq!(handler.call_count(), 3);

        let drops: Vec<_> = drain_events(&mut events)
            .into_iter()
            .filter(|e| matches!(e, OutboxEvent::Dropped(_)))
            .collect();
        assert_eq!(drops.len(), 1);
        assert!(matches!(
            &drops[0],
            OutboxEvent::Dropped(d) if d.kind == ActionKind::CreateEntity
        ));
    }

    #[tokio::test]
    async fn flaky_action_succeeds_on_third_pass() {
        let handler = MockHandler::new();
        handler.fail_next(2, "connection reset");
        let (outbox, store, _) = outbox_with(handler.clone(), true);
        outbox.update_entity("bot1", json!({"name": "X"}));

        outbox.drain().await;
        outbox.drain().await;
        assert_eq!(persisted(&store)[0].retry_count, 2);

        let report = outbox.drain().await;
        assert_eq!(report.applied.len(), 1);
        assert_eq!(outbox.pending_count(), 0);

        // Intermediate states never reached the cap
        let max_seen = store
            .history()
            .iter()
            .flat_map(|blob| decode_queue(blob).unwrap())
            .map(|a| a.retry_count)
            .max();
        assert_eq!(max_seen, Some(2));
    }

    #[tokio::test]
    async fn failure_does_not_block_later_actions() {
        let bad = MockHandler::failing("rejected");
        let good = MockHandler::new();
        let executors = ExecutorTable::new()
            .register(ActionKind::CreateEntity, bad.clone())
            .register(ActionKind::DeleteEntity, good.clone());
        let outbox = Outbox::new(
            &test_config(),
            MemoryStore::new(),
            executors,
            Arc::new(ConnectivityMonitor::new(true)),
        );

        let failing = outbox.create_entity(json!({}));
        let deleted = outbox.delete_entity("bot1");

        let report = outbox.drain().await;

        assert_eq!(report.retried, vec![failing]);
        assert_eq!(report.applied, vec![deleted]);
        assert_eq!(good.call_count(), 1);
        assert_eq!(outbox.snapshot()[0].id, failing);
    }

    #[tokio::test]
    async fn unregistered_kind_counts_as_failure() {
        let handler = MockHandler::new();
        let executors = ExecutorTable::new().register(ActionKind::CreateEntity, handler.clone());
        let outbox = Outbox::new(
            &test_config(),
            MemoryStore::new(),
            executors,
            Arc::new(ConnectivityMonitor::new(true)),
        );

        let orphan = outbox.send_message("bot1", json!("hi"));
        let created = outbox.create_entity(json!({}));

        let report = outbox.drain().await;

        assert_eq!(report.retried, vec![orphan]);
        assert_eq!(report.applied, vec![created]);
        assert_eq!(outbox.snapshot()[0].retry_count, 1);
    }

    #[tokio::test]
    async fn hung_executor_times_out_as_failure() {
        let handler = MockHandler::new();
        handler.set_latency(Duration::from_secs(30));
        let outbox = Outbox::new(
            &test_config().with_apply_timeout(Duration::from_millis(20)),
            MemoryStore::new(),
            ExecutorTable::uniform(handler),
            Arc::new(ConnectivityMonitor::new(true)),
        );
        outbox.create_entity(json!({}));

        let report = outbox.drain().await;

        assert_eq!(report.retried.len(), 1);
        assert_eq!(outbox.snapshot()[0].retry_count, 1);
        assert!(!outbox.is_draining());
    }

    #[tokio::test]
    async fn concurrent_drain_runs_one_pass() {
        let handler = MockHandler::new();
        handler.set_latency(Duration::from_millis(20));
        let (outbox, _, _) = outbox_with(handler.clone(), true);
        outbox.create_entity(json!({}));
        outbox.create_entity(json!({}));

        let (first, second) = tokio::join!(outbox.drain(), outbox.drain());

        assert_eq!(first.attempted(), 2);
        assert_eq!(second.skipped, Some(SkipReason::AlreadyDraining));
        assert_eq!(handler.call_count(), 2);
        assert!(!outbox.is_draining());
    }

    #[tokio::test]
    async fn action_enqueued_mid_drain_waits_for_next_pass() {
        let handler = MockHandler::new();
        handler.set_latency(Duration::from_millis(20));
        let (outbox, _, _) = outbox_with(handler.clone(), true);
        outbox.create_entity(json!({}));

        let late = outbox.clone();
        let (report, late_id) = tokio::join!(outbox.drain(), async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            late.delete_entity("bot1")
        });

        assert_eq!(report.attempted(), 1);
        assert_eq!(outbox.snapshot()[0].id, late_id);

        let next = outbox.drain().await;
        assert_eq!(next.applied, vec![late_id]);
    }

    #[tokio::test]
    async fn action_cleared_mid_drain_is_not_replayed() {
        let handler = MockHandler::new();
        handler.set_latency(Duration::from_millis(20));
        let (outbox, _, _) = outbox_with(handler.clone(), true);
        outbox.create_entity(json!({}));
        outbox.create_entity(json!({}));

        let clearer = outbox.clone();
        let (report, _) = tokio::join!(outbox.drain(), async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            clearer.clear()
        });

        // The in-flight action reached the executor but was no longer owned
        assert_eq!(handler.call_count(), 1);
        assert_eq!(report.attempted(), 0);
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn clearing_last_attempt_mid_call_reports_no_drop() {
        let mut action = QueuedAction::new(ActionKind::UpdateEntity, json!({"id": "bot1"}));
        action.retry_count = 2;
        let store = MemoryStore::with_blob(&encode_queue(&[action]).unwrap());
        let handler = MockHandler::failing("HTTP 503");
        handler.set_latency(Duration::from_millis(20));
        let outbox = Outbox::new(
            &test_config(),
            store.clone(),
            ExecutorTable::uniform(handler.clone()),
            Arc::new(ConnectivityMonitor::new(true)),
        );
        let mut events = outbox.subscribe();

        let clearer = outbox.clone();
        let (report, _) = tokio::join!(outbox.drain(), async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            clearer.clear()
        });

        assert_eq!(handler.call_count(), 1);
        assert!(report.dropped.is_empty());
        assert_eq!(
            drain_events(&mut events),
            vec![OutboxEvent::Cleared { removed: 1 }]
        );
        assert!(persisted(&store).is_empty());
    }

    #[tokio::test]
    async fn removing_action_mid_call_reports_no_retry() {
        let handler = MockHandler::failing("connection reset");
        handler.set_latency(Duration::from_millis(20));
        let (outbox, store, _) = outbox_with(handler.clone(), true);
        let id = outbox.create_entity(json!({}));
        let mut events = outbox.subscribe();

        let remover = outbox.clone();
        let (report, removed) = tokio::join!(outbox.drain(), async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            remover.remove(&id)
        });

        assert!(removed);
        assert!(report.retried.is_empty());
        assert!(drain_events(&mut events).is_empty());
        assert!(persisted(&store).is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_during_drain_is_not_fatal() {
        let handler = MockHandler::new();
        let (outbox, store, _) = outbox_with(handler.clone(), true);
        outbox.create_entity(json!({}));
        outbox.create_entity(json!({}));
        store.set_unavailable(true);

        let report = outbox.drain().await;

        assert_eq!(report.applied.len(), 2);
        assert_eq!(outbox.pending_count(), 0);

        // Store still holds the stale queue until the next successful write
        store.set_unavailable(false);
        assert_eq!(persisted(&store).len(), 2);
        outbox.clear();
        assert!(persisted(&store).is_empty());
    }

    #[tokio::test]
    async fn applied_events_are_emitted() {
        let (outbox, _, _) = outbox_with(MockHandler::new(), true);
        let mut events = outbox.subscribe();
        let id = outbox.create_entity(json!({}));

        outbox.drain().await;

        let events = drain_events(&mut events);
        assert_eq!(
            events,
            vec![
                OutboxEvent::Enqueued {
                    id,
                    kind: ActionKind::CreateEntity
                },
                OutboxEvent::Applied {
                    id,
                    kind: ActionKind::CreateEntity
                },
            ]
        );
    }

    #[test]
    fn enqueue_without_runtime_does_not_panic() {
        let outbox = Outbox::new(
            &OutboxConfig::default(),
            MemoryStore::new(),
            ExecutorTable::new(),
            Arc::new(ConnectivityMonitor::new(true)),
        );

        outbox.create_entity(json!({}));
        assert_eq!(outbox.pending_count(), 1);
    }
}
