//! Types for the watch api
//!
//! A watch response is a stream of newline separated `{"type": .., "object": ..}` records.
//! Records are decoded in two stages: the [`Envelope`] first, then its object
//! through the typed shape of the watched kind.

use crate::{error::ErrorResponse, metadata::TypeMeta, resource::Resource};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// A decoded event returned from a watch query
#[derive(Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<K> {
    /// Resource was added
    Added(K),
    /// Resource was modified
    Modified(K),
    /// Resource was deleted
    Deleted(K),
    /// Resource bookmark. Only carries a resource version to resume from.
    Bookmark(Bookmark),
    /// There was some kind of error
    Error(ErrorResponse),
}

impl<K> Debug for WatchEvent<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            WatchEvent::Added(_) => write!(f, "Added event"),
            WatchEvent::Modified(_) => write!(f, "Modified event"),
            WatchEvent::Deleted(_) => write!(f, "Deleted event"),
            WatchEvent::Bookmark(b) => write!(f, "Bookmark event at {}", b.metadata.resource_version),
            WatchEvent::Error(e) => write!(f, "Error event: {:?}", e),
        }
    }
}

/// Slimmed down object for [`WatchEvent::Bookmark`]
///
/// Bookmarks contain apiVersion + kind + basically empty metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Bookmark {
    /// apiVersion + kind
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,

    /// Basically empty metadata
    pub metadata: BookmarkMeta,
}

/// Slimmed down metadata for [`WatchEvent::Bookmark`]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMeta {
    /// The only field we need from a Bookmark event.
    pub resource_version: String,
}

/// The `type` field of a watch record
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Resource was added
    Added,
    /// Resource was modified
    Modified,
    /// Resource was deleted
    Deleted,
    /// Resource bookmark
    Bookmark,
    /// Server side error
    Error,
}

/// First decoding stage of a watch record
///
/// Failing to parse an envelope means the stream itself can no longer be trusted.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Envelope {
    /// Kind of event
    #[serde(rename = "type")]
    pub type_: EventType,
    /// Raw object, decoded in the second stage
    pub object: serde_json::Value,
}

impl Envelope {
    /// Second decoding stage
    ///
    /// An object that does not decode is turned into a [`WatchEvent::Error`] carrying
    /// [`ErrorResponse::malformed_object`] so that a single bad record can be skipped.
    pub fn into_event<K>(self, dt: &K::DynamicType) -> WatchEvent<K>
    where
        K: Resource + DeserializeOwned,
    {
        let decoded = match self.type_ {
            EventType::Added => K::decode(dt, self.object).map(WatchEvent::Added),
            EventType::Modified => K::decode(dt, self.object).map(WatchEvent::Modified),
            EventType::Deleted => K::decode(dt, self.object).map(WatchEvent::Deleted),
            EventType::Bookmark => serde_json::from_value(self.object).map(WatchEvent::Bookmark),
            EventType::Error => serde_json::from_value(self.object).map(WatchEvent::Error),
        };
        decoded.unwrap_or_else(|err| WatchEvent::Error(ErrorResponse::malformed_object(&err)))
    }
}
