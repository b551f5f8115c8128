//! Scripted in-memory backend for integration tests.

use livesync::{
    CollectionSource, Entity, LoadingStatus, Result, SubscriptionTarget, SubscriptionToken,
    SyncError, UpdateEvent, UpdateSink,
};
use parking_lot::Mutex;
use std::collections::HashMap;

struct OpenSub {
    target: SubscriptionTarget,
    sink: UpdateSink,
    /// How many pages have been served to this subscription.
    served: usize,
}

struct Inner {
    /// History pages per target, in the order they are served.
    pages: HashMap<SubscriptionTarget, Vec<Vec<Entity>>>,
    open: HashMap<u64, OpenSub>,
    next_token: u64,
    fail_open: bool,
    fail_next_page: bool,
}

/// Backend that serves pre-scripted pages synchronously: open delivers the
/// first page, each `request_next_page` re-delivers the grown prefix as an
/// authoritative snapshot followed by a status change.
pub struct ScriptedSource {
    inner: Mutex<Inner>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pages: HashMap::new(),
                open: HashMap::new(),
                next_token: 1,
                fail_open: false,
                fail_next_page: false,
            }),
        }
    }

    pub fn script_pages(&self, target: SubscriptionTarget, pages: Vec<Vec<Entity>>) {
        self.inner.lock().pages.insert(target, pages);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().fail_open = fail;
    }

    pub fn set_fail_next_page(&self, fail: bool) {
        self.inner.lock().fail_next_page = fail;
    }

    /// Clone the live sink for a target, emulating an in-flight remote
    /// message that outlives its subscription.
    pub fn sink_for(&self, target: &SubscriptionTarget) -> UpdateSink {
        self.inner
            .lock()
            .open
            .values()
            .find(|sub| &sub.target == target)
            .map(|sub| sub.sink.clone())
            .expect("no open subscription for target")
    }

    /// Push a live upsert to whoever is subscribed to `target`.
    pub fn push_upsert(&self, target: &SubscriptionTarget, entity: Entity) {
        let sink = self.sink_for(target);
        sink.push(UpdateEvent::Upsert { entity });
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().open.len()
    }

    fn serve(pages: &[Vec<Entity>], served: usize, sink: &UpdateSink) -> usize {
        let upto = (served + 1).min(pages.len());
        let items: Vec<Entity> = pages[..upto].iter().flatten().cloned().collect();
        sink.push(UpdateEvent::Snapshot { items });
        sink.push(UpdateEvent::StatusChange {
            status: LoadingStatus::Loaded,
            has_more: upto < pages.len(),
        });
        upto
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionSource for ScriptedSource {
    fn open_subscription(
        &self,
        target: &SubscriptionTarget,
        sink: UpdateSink,
    ) -> Result<SubscriptionToken> {
        let mut inner = self.inner.lock();
        if inner.fail_open {
            return Err(SyncError::Subscription("backend unreachable".into()));
        }

        let token = inner.next_token;
        inner.next_token += 1;

        let pages = inner.pages.get(target).cloned().unwrap_or_default();
        let served = if pages.is_empty() {
            sink.push(UpdateEvent::Snapshot { items: vec![] });
            sink.push(UpdateEvent::StatusChange {
                status: LoadingStatus::Loaded,
                has_more: false,
            });
            0
        } else {
            Self::serve(&pages, 0, &sink)
        };

        inner.open.insert(
            token,
            OpenSub {
                target: target.clone(),
                sink,
                served,
            },
        );
        Ok(SubscriptionToken(token))
    }

    fn close_subscription(&self, token: SubscriptionToken) {
        self.inner.lock().open.remove(&token.0);
    }

    fn request_next_page(&self, target: &SubscriptionTarget) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_next_page {
            return Err(SyncError::Subscription("page request timed out".into()));
        }

        let pages = inner.pages.get(target).cloned().unwrap_or_default();
        for sub in inner.open.values_mut() {
            if &sub.target == target {
                sub.served = Self::serve(&pages, sub.served, &sub.sink);
            }
        }
        Ok(())
    }
}

pub fn entity(id: &str, text: &str) -> Entity {
    Entity::new(id, serde_json::json!({ "text": text }))
}
