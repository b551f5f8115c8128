//! Single live binding to one remote collection.

use crate::error::{Result, SyncError};
use crate::types::{Generation, SubscriptionTarget};
use std::sync::Arc;
use tracing::debug;

use super::source::{CollectionSource, SubscriptionToken, UpdateSink};

/// One open remote subscription: the target it observes, the generation its
/// events are tagged with, and the remote-side token needed to close it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    target: SubscriptionTarget,
    generation: Generation,
    token: SubscriptionToken,
}

impl SubscriptionHandle {
    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Owns at most one live subscription and the generation counter for its
/// slot. Opening over an already-open slot is a caller error; the slot must
/// be closed first.
pub struct SubscriptionSlot {
    source: Arc<dyn CollectionSource>,
    /// Last allocated generation; 0 means never subscribed.
    last_generation: Generation,
    active: Option<SubscriptionHandle>,
}

impl SubscriptionSlot {
    pub fn new(source: Arc<dyn CollectionSource>) -> Self {
        Self {
            source,
            last_generation: Generation(0),
            active: None,
        }
    }

    /// The active subscription, if any.
    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.active.as_ref()
    }

    /// Target of the active subscription, if any.
    pub fn target(&self) -> Option<&SubscriptionTarget> {
        self.active.as_ref().map(|h| h.target())
    }

    /// Generation whose events are currently applied; None while closed.
    pub fn live_generation(&self) -> Option<Generation> {
        self.active.as_ref().map(|h| h.generation())
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Open a subscription for `target` at the next generation.
    ///
    /// `make_sink` receives the new generation so the sink can tag every
    /// event it delivers. A remote open failure leaves the slot closed and
    /// burns the generation, which keeps any events the failed open may
    /// already have pushed from ever being applied.
    pub fn open<F>(&mut self, target: SubscriptionTarget, make_sink: F) -> Result<Generation>
    where
        F: FnOnce(Generation) -> UpdateSink,
    {
        if let Some(active) = &self.active {
            return Err(SyncError::SlotOccupied(active.target().clone()));
        }

        let generation = self.last_generation.next();
        self.last_generation = generation;

        let token = self.source.open_subscription(&target, make_sink(generation))?;
        debug!(subscription = %target, %generation, ?token, "subscription opened");

        self.active = Some(SubscriptionHandle {
            target,
            generation,
            token,
        });
        Ok(generation)
    }

    /// Close the active subscription, if any. Unconditional and immediate
    /// from the consumer's view; events still in flight for the closed
    /// generation are dropped by the owner's generation guard.
    pub fn close(&mut self) {
        if let Some(handle) = self.active.take() {
            debug!(subscription = %handle.target, generation = %handle.generation, "subscription closed");
            self.source.close_subscription(handle.token);
        }
    }

    /// Ask the remote for another page of the active target.
    pub fn request_next_page(&self) -> Result<()> {
        match &self.active {
            Some(handle) => self.source.request_next_page(handle.target()),
            None => Ok(()),
        }
    }
}
