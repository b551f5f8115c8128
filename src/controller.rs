//! Live collection controller tying subscription, merge, and pagination
//! together.

use crate::error::{Result, SyncError};
use crate::merge::{merge, CollectionUpdate, OrderedCollectionState};
use crate::pagination::{PageRequest, PaginationCursor};
use crate::subscriptions::{
    CollectionSource, SubscriptionSlot, TaggedUpdate, UpdateEvent, UpdateSink,
};
use crate::types::{Entity, Generation, LoadingStatus, SubscriptionTarget};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Immutable snapshot handed to observers on every state or status change.
#[derive(Clone, Debug)]
pub struct CollectionView {
    /// Currently bound target; None before the first bind and after a
    /// failed open.
    pub target: Option<SubscriptionTarget>,
    pub items: Vec<Entity>,
    pub status: LoadingStatus,
    pub has_more: bool,
}

impl CollectionView {
    /// Whether a load-more affordance should be offered.
    pub fn can_load_more(&self) -> bool {
        self.status == LoadingStatus::Loaded && self.has_more
    }
}

/// What happened to a `load_next`/`retry` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadNextOutcome {
    /// A page request was dispatched to the remote.
    Requested,
    /// Benign no-op: already loading, nothing more to load, or unbound.
    Skipped,
}

type UpdateCallback = Arc<dyn Fn(&CollectionView) + Send + Sync>;

/// Keeps one observer registered; dropping it unregisters the callback.
pub struct ObserverGuard {
    id: u64,
    inner: Weak<ControllerInner>,
}

impl ObserverGuard {
    /// Unregister explicitly (dropping the guard does the same).
    pub fn unsubscribe(self) {}
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.observers.write().remove(&self.id);
        }
    }
}

/// Mutable controller state, always accessed under one lock so merge
/// invariants hold even if the remote delivers from multiple threads.
struct ControllerState {
    slot: SubscriptionSlot,
    items: OrderedCollectionState,
    cursor: PaginationCursor,
    disposed: bool,
}

struct ControllerInner {
    pending_tx: Sender<TaggedUpdate>,
    pending_rx: Receiver<TaggedUpdate>,
    state: Mutex<ControllerState>,
    observers: RwLock<HashMap<u64, UpdateCallback>>,
    next_observer_id: AtomicU64,
}

impl ControllerInner {
    /// Drain pending remote events into state, then notify observers, one
    /// view per applied change.
    ///
    /// Exactly one drainer runs at a time (whoever wins the state lock) and
    /// losers return immediately. Every public entry point re-runs drain
    /// after releasing the state lock, so a push that loses the race to any
    /// lock holder is picked up by that holder on its way out.
    fn drain(self: &Arc<Self>) {
        loop {
            let views = {
                let Some(mut state) = self.state.try_lock() else {
                    return;
                };
                let mut views = Vec::new();
                while let Ok(tagged) = self.pending_rx.try_recv() {
                    if Self::apply(&mut state, tagged) && !state.disposed {
                        views.push(Self::view_of(&state));
                    }
                }
                views
            };

            for view in &views {
                self.notify(view);
            }
            if self.pending_rx.is_empty() {
                return;
            }
        }
    }

    /// Apply one tagged event. Returns whether observable state changed.
    fn apply(state: &mut ControllerState, tagged: TaggedUpdate) -> bool {
        let Some(live) = state.slot.live_generation() else {
            debug!(generation = %tagged.generation, "discarding event, no live subscription");
            return false;
        };
        if tagged.generation != live {
            debug!(stale = %tagged.generation, %live, "discarding stale-generation event");
            return false;
        }

        match tagged.event {
            UpdateEvent::Snapshot { items } => {
                let next = merge(&state.items, &CollectionUpdate::Snapshot(items));
                let changed = next != state.items;
                state.items = next;
                changed
            }
            UpdateEvent::Upsert { entity } => {
                let next = merge(&state.items, &CollectionUpdate::Upsert(entity));
                let changed = next != state.items;
                state.items = next;
                changed
            }
            UpdateEvent::StatusChange { status, has_more } => {
                state.cursor.complete(status, has_more);
                true
            }
        }
    }

    fn view_of(state: &ControllerState) -> CollectionView {
        CollectionView {
            target: state.slot.target().cloned(),
            items: state.items.entries().to_vec(),
            status: state.cursor.status(),
            has_more: state.cursor.has_more(),
        }
    }

    /// Invoke observers outside both locks; callbacks may call back into
    /// the controller, register or drop guards, or dispose it. An observer
    /// unregistered by an earlier callback of the same delivery still
    /// receives the in-flight view.
    fn notify(&self, view: &CollectionView) {
        let callbacks: Vec<UpdateCallback> =
            self.observers.read().values().cloned().collect();
        for callback in callbacks {
            callback(view);
        }
    }
}

/// Continuously-updated, ordered view of one remote collection.
///
/// Composes a [`SubscriptionSlot`], the pure merge, and a
/// [`PaginationCursor`] into the reusable piece a UI binds to: point it at a
/// target with [`bind`](Self::bind), observe with
/// [`on_update`](Self::on_update), page with [`load_next`](Self::load_next),
/// and release with [`dispose`](Self::dispose). Re-binding to a different
/// target tears the old subscription down completely before the new one
/// opens; events of the old generation are discarded even if they arrive
/// late.
pub struct LiveCollectionController {
    inner: Arc<ControllerInner>,
}

impl LiveCollectionController {
    pub fn new(source: Arc<dyn CollectionSource>) -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            inner: Arc::new(ControllerInner {
                pending_tx,
                pending_rx,
                state: Mutex::new(ControllerState {
                    slot: SubscriptionSlot::new(source),
                    items: OrderedCollectionState::new(),
                    cursor: PaginationCursor::new(),
                    disposed: false,
                }),
                observers: RwLock::new(HashMap::new()),
                next_observer_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to `target`, tearing down any previous subscription first.
    ///
    /// Re-binding the current target is a no-op. A remote open failure is
    /// surfaced as `LoadingStatus::Failed` through observers, not as an
    /// error. Binding a disposed controller is a programmer error.
    pub fn bind(&self, target: SubscriptionTarget) -> Result<()> {
        let outcome = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                Err(SyncError::Disposed)
            } else if state.slot.target() == Some(&target) {
                Ok(None)
            } else {
                state.slot.close();
                state.items = OrderedCollectionState::new();
                state.cursor = PaginationCursor::new();

                let sink = |generation| self.make_sink(generation);
                match state.slot.open(target.clone(), sink) {
                    Ok(_) => state.cursor.begin_initial_load(),
                    Err(err) => {
                        warn!(subscription = %target, error = %err, "failed to open subscription");
                        state.cursor.complete(LoadingStatus::Failed, false);
                    }
                }
                Ok(Some(ControllerInner::view_of(&state)))
            }
        };

        if let Ok(Some(view)) = &outcome {
            self.inner.notify(view);
        }
        // The open may have pushed events synchronously while we held the
        // state lock, and an unrelated push may have lost its drain race to
        // us; pick both up now that the lock is free.
        self.inner.drain();
        outcome.map(|_| ())
    }

    /// Register a state-change observer. Every merge-produced change and
    /// every loading-status change delivers a fresh [`CollectionView`].
    pub fn on_update<F>(&self, callback: F) -> Result<ObserverGuard>
    where
        F: Fn(&CollectionView) + Send + Sync + 'static,
    {
        let disposed = self.inner.state.lock().disposed;
        self.inner.drain();
        if disposed {
            return Err(SyncError::Disposed);
        }
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::SeqCst);
        self.inner.observers.write().insert(id, Arc::new(callback));
        Ok(ObserverGuard {
            id,
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Request the next page of history.
    ///
    /// No-op (`Skipped`) while a request is in flight, when the remote
    /// reported no more pages, after a failure, or while unbound.
    pub fn load_next(&self) -> Result<LoadNextOutcome> {
        let decision = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                Err(SyncError::Disposed)
            } else {
                match state.slot.target().cloned() {
                    None => Ok(None),
                    Some(target) => match state.cursor.request_next() {
                        PageRequest::Dispatch => {
                            Ok(Some((target, ControllerInner::view_of(&state))))
                        }
                        PageRequest::AlreadyLoading | PageRequest::Ignored => Ok(None),
                    },
                }
            }
        };
        self.inner.drain();

        match decision? {
            Some((target, view)) => {
                self.inner.notify(&view);
                self.dispatch_page_request(&target);
                Ok(LoadNextOutcome::Requested)
            }
            None => Ok(LoadNextOutcome::Skipped),
        }
    }

    /// Re-enter Loading after a failed page load and ask the remote again.
    /// No-op unless the current status is Failed and a subscription is open.
    pub fn retry(&self) -> Result<LoadNextOutcome> {
        let decision = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                Err(SyncError::Disposed)
            } else {
                match state.slot.target().cloned() {
                    Some(target) if state.cursor.retry() => {
                        Ok(Some((target, ControllerInner::view_of(&state))))
                    }
                    _ => Ok(None),
                }
            }
        };
        self.inner.drain();

        match decision? {
            Some((target, view)) => {
                self.inner.notify(&view);
                self.dispatch_page_request(&target);
                Ok(LoadNextOutcome::Requested)
            }
            None => Ok(LoadNextOutcome::Skipped),
        }
    }

    /// Close the subscription, discard state, unregister all observers.
    /// Idempotent; late events for the closed generation are dropped
    /// silently.
    pub fn dispose(&self) {
        let first = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                false
            } else {
                state.disposed = true;
                state.slot.close();
                state.items = OrderedCollectionState::new();
                state.cursor = PaginationCursor::new();
                true
            }
        };
        if first {
            self.inner.observers.write().clear();
            debug!("controller disposed");
        }
        // Flush anything a pusher failed to apply while we held the lock;
        // the generation guard discards it.
        self.inner.drain();
    }

    /// Current view, for hosts that poll instead of observing.
    pub fn view(&self) -> CollectionView {
        // Apply anything still queued before snapshotting, and drain again
        // afterwards in case a push lost its drain race to our lock hold.
        self.inner.drain();
        let view = ControllerInner::view_of(&self.inner.state.lock());
        self.inner.drain();
        view
    }

    fn dispatch_page_request(&self, target: &SubscriptionTarget) {
        let result = {
            let state = self.inner.state.lock();
            state.slot.request_next_page()
        };
        if let Err(err) = result {
            warn!(subscription = %target, error = %err, "page request failed");
            let view = {
                let mut state = self.inner.state.lock();
                state.cursor.complete(LoadingStatus::Failed, false);
                ControllerInner::view_of(&state)
            };
            self.inner.notify(&view);
        }
        // A synchronous remote may already have answered.
        self.inner.drain();
    }

    fn make_sink(&self, generation: Generation) -> UpdateSink {
        let weak = Arc::downgrade(&self.inner);
        UpdateSink::new(generation, self.inner.pending_tx.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                inner.drain();
            }
        })
    }
}

impl Drop for LiveCollectionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::subscriptions::SubscriptionToken;
    use serde_json::json;

    /// Source that hands out sinks for the test to drive manually.
    #[derive(Default)]
    struct ManualSource {
        sinks: Mutex<Vec<UpdateSink>>,
        next_token: AtomicU64,
    }

    impl ManualSource {
        fn last_sink(&self) -> UpdateSink {
            self.sinks.lock().last().expect("no open subscription").clone()
        }
    }

    impl CollectionSource for ManualSource {
        fn open_subscription(
            &self,
            _target: &SubscriptionTarget,
            sink: UpdateSink,
        ) -> Result<SubscriptionToken> {
            self.sinks.lock().push(sink);
            Ok(SubscriptionToken(
                self.next_token.fetch_add(1, Ordering::SeqCst),
            ))
        }

        fn close_subscription(&self, _token: SubscriptionToken) {}

        fn request_next_page(&self, _target: &SubscriptionTarget) -> Result<()> {
            Ok(())
        }
    }

    fn entity(id: &str) -> Entity {
        Entity::new(id, json!({}))
    }

    #[test]
    fn test_bind_same_target_is_noop() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());

        controller.bind(SubscriptionTarget::channel("a")).unwrap();
        controller.bind(SubscriptionTarget::channel("a")).unwrap();

        assert_eq!(source.sinks.lock().len(), 1);
    }

    #[test]
    fn test_snapshot_then_upserts() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());
        controller.bind(SubscriptionTarget::messages("a")).unwrap();

        let sink = source.last_sink();
        sink.push(UpdateEvent::Snapshot {
            items: vec![entity("1"), entity("2")],
        });
        sink.push(UpdateEvent::Upsert {
            entity: Entity::new("1", json!({"text": "x"})),
        });
        sink.push(UpdateEvent::Upsert {
            entity: entity("3"),
        });

        let view = controller.view();
        let ids: Vec<&str> = view.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(view.items[0].payload, json!({"text": "x"}));
    }

    #[test]
    fn test_rebind_discards_stale_generation() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());

        controller.bind(SubscriptionTarget::messages("a")).unwrap();
        let old_sink = source.last_sink();
        old_sink.push(UpdateEvent::Snapshot {
            items: vec![entity("1"), entity("2")],
        });
        assert_eq!(controller.view().items.len(), 2);

        controller.bind(SubscriptionTarget::messages("b")).unwrap();
        assert!(controller.view().items.is_empty());

        // Late event from the old generation arrives after the rebind.
        old_sink.push(UpdateEvent::Upsert {
            entity: entity("4"),
        });
        assert!(controller.view().items.is_empty());
    }

    #[test]
    fn test_updates_after_dispose_are_dropped() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());
        controller.bind(SubscriptionTarget::messages("a")).unwrap();
        let sink = source.last_sink();

        controller.dispose();
        controller.dispose(); // idempotent

        sink.push(UpdateEvent::Snapshot {
            items: vec![entity("1")],
        });
        assert!(controller.view().items.is_empty());
    }

    #[test]
    fn test_disposed_controller_rejects_operations() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source);
        controller.dispose();

        assert!(matches!(
            controller.bind(SubscriptionTarget::channel("a")),
            Err(SyncError::Disposed)
        ));
        assert!(matches!(controller.load_next(), Err(SyncError::Disposed)));
        assert!(matches!(
            controller.on_update(|_| {}),
            Err(SyncError::Disposed)
        ));
    }

    #[test]
    fn test_observer_guard_unregisters_on_drop() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());
        controller.bind(SubscriptionTarget::messages("a")).unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let guard = {
            let seen = seen.clone();
            controller
                .on_update(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        source.last_sink().push(UpdateEvent::Upsert {
            entity: entity("1"),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        guard.unsubscribe();
        source.last_sink().push(UpdateEvent::Upsert {
            entity: entity("2"),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_drop_another_guard() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());
        controller.bind(SubscriptionTarget::messages("a")).unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let watched = {
            let seen = seen.clone();
            controller
                .on_update(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        // This observer unregisters the watched one from inside a delivery.
        let held: Arc<Mutex<Option<ObserverGuard>>> = Arc::new(Mutex::new(Some(watched)));
        let _dropper = {
            let held = held.clone();
            controller
                .on_update(move |_| {
                    held.lock().take();
                })
                .unwrap()
        };

        // Must not wedge on the registry lock.
        source.last_sink().push(UpdateEvent::Upsert {
            entity: entity("1"),
        });
        assert!(held.lock().is_none());

        let after_first = seen.load(Ordering::SeqCst);
        source.last_sink().push(UpdateEvent::Upsert {
            entity: entity("2"),
        });
        assert_eq!(seen.load(Ordering::SeqCst), after_first);
        assert_eq!(controller.view().items.len(), 2);
    }

    #[test]
    fn test_callback_may_dispose_controller() {
        let source = Arc::new(ManualSource::default());
        let controller = Arc::new(LiveCollectionController::new(source.clone()));
        controller.bind(SubscriptionTarget::messages("a")).unwrap();

        let inner = controller.clone();
        let _guard = controller
            .on_update(move |_| {
                inner.dispose();
            })
            .unwrap();

        // Must not wedge on the registry lock while dispose clears it.
        source.last_sink().push(UpdateEvent::Upsert {
            entity: entity("1"),
        });

        assert!(controller.view().items.is_empty());
        assert!(matches!(
            controller.bind(SubscriptionTarget::messages("b")),
            Err(SyncError::Disposed)
        ));
    }

    #[test]
    fn test_idempotent_upsert_does_not_notify() {
        let source = Arc::new(ManualSource::default());
        let controller = LiveCollectionController::new(source.clone());
        controller.bind(SubscriptionTarget::messages("a")).unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let _guard = {
            let seen = seen.clone();
            controller
                .on_update(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        let sink = source.last_sink();
        sink.push(UpdateEvent::Upsert {
            entity: entity("1"),
        });
        sink.push(UpdateEvent::Upsert {
            entity: entity("1"),
        });

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(controller.view().items.len(), 1);
    }
}
