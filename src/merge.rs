//! Pure merge of incoming updates into ordered collection state.

use crate::types::{Entity, EntityId};

/// Ordered sequence of entities with unique identity keys.
///
/// Order is insertion order for newly-seen entities, or the order given by
/// the most recent snapshot for paginated history. No entity appears twice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedCollectionState {
    entries: Vec<Entity>,
}

impl OrderedCollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entity] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.position(id).map(|i| &self.entries[i])
    }

    /// Ordered identity keys, mostly useful in assertions.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Build state from a snapshot, keeping the first occurrence of each id.
    fn from_snapshot(items: &[Entity]) -> Self {
        let mut state = Self::new();
        for item in items {
            if !state.contains(&item.id) {
                state.entries.push(item.clone());
            }
        }
        state
    }
}

/// An incoming change to a collection.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionUpdate {
    /// Authoritative listing of the currently loaded items. Replaces local
    /// positions entirely; the snapshot's own order wins.
    Snapshot(Vec<Entity>),

    /// New data for a single identity key. Appends when the key is unseen,
    /// replaces the payload in place when it exists.
    Upsert(Entity),
}

/// Fold one update into existing state.
///
/// Idempotent: applying the same update twice yields the same state as
/// applying it once. Never drops unrelated entries and never introduces
/// duplicate identity keys. An in-place upsert keeps the entity's position
/// so an already-visible item does not jump around.
pub fn merge(current: &OrderedCollectionState, update: &CollectionUpdate) -> OrderedCollectionState {
    match update {
        CollectionUpdate::Snapshot(items) => OrderedCollectionState::from_snapshot(items),

        CollectionUpdate::Upsert(entity) => {
            let mut next = current.clone();
            match next.position(&entity.id) {
                Some(i) => next.entries[i].payload = entity.payload.clone(),
                None => next.entries.push(entity.clone()),
            }
            next
        }
    }
}
