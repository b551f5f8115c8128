//! Boundary to the remote collection backend.

use crate::error::Result;
use crate::types::{Entity, Generation, LoadingStatus, SubscriptionTarget};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Events pushed by the remote side for one subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// Authoritative full listing of the currently loaded items.
    Snapshot { items: Vec<Entity> },

    /// New data for a single entity, new or replacing an existing one.
    Upsert { entity: Entity },

    /// Loading status changed; `has_more` reports whether further
    /// historical pages exist.
    StatusChange {
        status: LoadingStatus,
        has_more: bool,
    },
}

/// An update event tagged with the subscription generation it belongs to.
#[derive(Clone, Debug)]
pub struct TaggedUpdate {
    pub generation: Generation,
    pub event: UpdateEvent,
}

/// Remote-assigned identifier of an open subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub u64);

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionToken({})", self.0)
    }
}

/// Where the remote pushes events for one subscription lifetime.
///
/// Each sink is pinned to the generation it was created for; everything it
/// delivers is tagged so the owning controller can discard events that
/// outlive their subscription. Pushing never blocks the remote.
#[derive(Clone)]
pub struct UpdateSink {
    generation: Generation,
    tx: Sender<TaggedUpdate>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl UpdateSink {
    pub fn new(
        generation: Generation,
        tx: Sender<TaggedUpdate>,
        wake: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            generation,
            tx,
            wake: Arc::new(wake),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Push one event. Send failure means the consumer side is gone, in
    /// which case the event is irrelevant anyway.
    pub fn push(&self, event: UpdateEvent) {
        let _ = self.tx.send(TaggedUpdate {
            generation: self.generation,
            event,
        });
        (self.wake)();
    }
}

impl fmt::Debug for UpdateSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// The remote backend as seen by the sync core.
///
/// Implementations wrap the actual chat transport/session layer. The core
/// only assumes: events for one token arrive in the order the remote
/// produced them, and no events are delivered for a token after
/// `close_subscription` returns (a briefly-racing push is tolerated, the
/// generation guard drops it).
pub trait CollectionSource: Send + Sync {
    /// Begin a subscription; the remote pushes `UpdateEvent`s into `sink`
    /// from now on. The first page request is implied and answered with a
    /// `StatusChange` once resolved.
    fn open_subscription(
        &self,
        target: &SubscriptionTarget,
        sink: UpdateSink,
    ) -> Result<SubscriptionToken>;

    /// End a subscription. Best effort; must not panic on unknown tokens.
    fn close_subscription(&self, token: SubscriptionToken);

    /// Ask for one more page of history. The remote answers with a
    /// Snapshot/Upsert batch followed by a `StatusChange`.
    fn request_next_page(&self, target: &SubscriptionTarget) -> Result<()>;
}
