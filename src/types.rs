//! Core types for live collections.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity key of an entity (message id, channel id).
///
/// Identity is immutable for the entity's lifetime; only the payload changes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

/// Identifier of a channel on the remote side.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        ChannelId(id.into())
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

/// One item of a live collection: a stable id plus a remote-supplied payload.
///
/// The payload is arbitrary key/value data (channel metadata, message body)
/// and may be replaced wholesale by later upserts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub payload: serde_json::Value,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, payload: serde_json::Value) -> Self {
        Entity {
            id: id.into(),
            payload,
        }
    }
}

/// What a controller is observing. Changing the target is a full lifecycle
/// event (teardown then setup), never an in-place patch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionTarget {
    /// A channel entity itself (metadata, membership, ...).
    Channel { channel: ChannelId },
    /// The message history of a channel.
    ChannelMessages { channel: ChannelId },
}

impl SubscriptionTarget {
    pub fn channel(id: impl Into<ChannelId>) -> Self {
        SubscriptionTarget::Channel { channel: id.into() }
    }

    pub fn messages(id: impl Into<ChannelId>) -> Self {
        SubscriptionTarget::ChannelMessages { channel: id.into() }
    }
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionTarget::Channel { channel } => write!(f, "channel:{}", channel),
            SubscriptionTarget::ChannelMessages { channel } => write!(f, "messages:{}", channel),
        }
    }
}

/// Loading state of a paginated collection. Governs whether further
/// pagination requests are permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Tag distinguishing one subscription lifetime from the next.
///
/// Allocated monotonically per slot; events carrying an older generation
/// than the slot's current one are discarded instead of applied.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen({})", self.0)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
