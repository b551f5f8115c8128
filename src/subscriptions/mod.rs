//! Live subscriptions to remote collections.
//!
//! This module holds the pieces between the sync core and the remote
//! backend:
//! - [`CollectionSource`] — the boundary trait a backend implements
//! - [`UpdateSink`] — where the backend pushes generation-tagged events
//! - [`SubscriptionSlot`] — one-at-a-time ownership of a live subscription,
//!   with monotone generation allocation for stale-event discard
//!
//! A slot enforces open/close discipline: at most one live subscription,
//! closed before the next open. The generation carried by each event is the
//! only thing the consumer needs to tell a live update from a leftover of a
//! previous subscription.

mod handle;
mod source;

pub use handle::{SubscriptionHandle, SubscriptionSlot};
pub use source::{CollectionSource, SubscriptionToken, TaggedUpdate, UpdateEvent, UpdateSink};
