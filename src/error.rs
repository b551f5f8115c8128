//! Error types for the sync core.

use crate::types::SubscriptionTarget;
use thiserror::Error;

/// Main error type for controller and subscription operations.
///
/// Remote failures never surface here from push paths; they are mapped to
/// `LoadingStatus::Failed` so the consumer can retry or re-bind. The variants
/// below split into programmer misuse (loud, not retried) and remote trouble
/// (recoverable).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Operation on a controller after `dispose()`.
    #[error("Controller is disposed")]
    Disposed,

    /// Attempt to open a subscription slot that is already open.
    #[error("Subscription slot already open for {0}")]
    SlotOccupied(SubscriptionTarget),

    /// Remote subscription open or page request failed.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
