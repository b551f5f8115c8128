//! Loading-status state machine gating cursor pagination.

use crate::types::LoadingStatus;

/// Outcome of asking the cursor for another page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRequest {
    /// Caller should issue a remote page request.
    Dispatch,
    /// A request is already in flight; benign no-op.
    AlreadyLoading,
    /// Nothing further to load (no more pages, or Failed without retry).
    Ignored,
}

/// Tracks whether more history exists for a subscribed collection and gates
/// "load next page" requests.
///
/// Transitions: Idle -> Loading (initial subscribe or explicit load), then
/// Loading -> Loaded/Failed on the remote's status change. From Loaded a new
/// load is allowed only while `has_more` is true. From Failed the only ways
/// forward are a fresh subscribe (the owner rebuilds the cursor) or an
/// explicit retry.
#[derive(Clone, Debug, Default)]
pub struct PaginationCursor {
    status: LoadingStatus,
    has_more: bool,
}

impl PaginationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> LoadingStatus {
        self.status
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether the consumer may be offered a load-more affordance.
    pub fn can_load_more(&self) -> bool {
        self.status == LoadingStatus::Loaded && self.has_more
    }

    /// Enter Loading for the first page of a fresh subscription.
    pub fn begin_initial_load(&mut self) {
        self.status = LoadingStatus::Loading;
        self.has_more = false;
    }

    /// Gate a "load next page" request.
    pub fn request_next(&mut self) -> PageRequest {
        match self.status {
            LoadingStatus::Idle => {
                self.status = LoadingStatus::Loading;
                PageRequest::Dispatch
            }
            LoadingStatus::Loading => PageRequest::AlreadyLoading,
            LoadingStatus::Loaded if self.has_more => {
                self.status = LoadingStatus::Loading;
                PageRequest::Dispatch
            }
            LoadingStatus::Loaded => PageRequest::Ignored,
            LoadingStatus::Failed => PageRequest::Ignored,
        }
    }

    /// Explicit retry after a failure. Returns false unless status is Failed.
    pub fn retry(&mut self) -> bool {
        if self.status == LoadingStatus::Failed {
            self.status = LoadingStatus::Loading;
            true
        } else {
            false
        }
    }

    /// Apply a remote status change. `has_more` is remote-supplied and is
    /// the sole gate for further pagination.
    pub fn complete(&mut self, status: LoadingStatus, has_more: bool) {
        self.status = status;
        self.has_more = match status {
            LoadingStatus::Loaded => has_more,
            _ => false,
        };
    }
}
