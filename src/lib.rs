//! # Livesync
//!
//! Live-collection synchronization for chat-style clients: subscribe to a
//! remote, incrementally loaded, push-updated collection (channels or
//! messages), keep a local ordered copy in sync without losing order or
//! duplicating entries, and page through history on demand.
//!
//! ## Core Concepts
//!
//! - **Entities**: items with a stable identity key and a mutable payload
//! - **Merge**: pure, idempotent folding of snapshots and upserts into
//!   ordered state
//! - **Pagination**: a loading-status machine gated by the remote's
//!   `has_more`
//! - **Generations**: monotone tags that let a controller drop events left
//!   over from a previous subscription
//!
//! ## Example
//!
//! ```ignore
//! use livesync::{LiveCollectionController, SubscriptionTarget};
//!
//! let controller = LiveCollectionController::new(backend);
//! let _guard = controller.on_update(|view| {
//!     render(&view.items, view.can_load_more());
//! })?;
//!
//! controller.bind(SubscriptionTarget::messages("general"))?;
//! // ... user scrolls up ...
//! controller.load_next()?;
//! // ... user switches channel ...
//! controller.bind(SubscriptionTarget::messages("random"))?;
//! controller.dispose();
//! ```

pub mod controller;
pub mod error;
pub mod merge;
pub mod pagination;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use controller::{CollectionView, LiveCollectionController, LoadNextOutcome, ObserverGuard};
pub use error::{Result, SyncError};
pub use merge::{merge, CollectionUpdate, OrderedCollectionState};
pub use pagination::{PageRequest, PaginationCursor};
pub use subscriptions::{
    CollectionSource, SubscriptionHandle, SubscriptionSlot, SubscriptionToken, TaggedUpdate,
    UpdateEvent, UpdateSink,
};
pub use types::*;
