//! # Events
//!
//! Unaddressed notifications published on a realm's event bus.

use crate::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Event tags. Ordered so the wire form is stable.
pub type Tags = BTreeSet<String>;

/// Build a tag set from anything string-like.
pub fn tags<I, S>(items: I) -> Tags
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// A fire-and-forget notification.
///
/// Immutable once created. The `id` is a fresh UUID, unique for the lifetime
/// of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: String,
    /// Dotted event name, e.g. `"kaitiaki.invoked"`.
    pub name: String,
    /// Realm whose bus published the event.
    pub source_realm: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Event body.
    pub payload: Payload,
    /// Free-form labels used by subscription tag filters.
    pub tags: Tags,
}

impl Event {
    /// Create a new event stamped with the current time and a fresh id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_realm: impl Into<String>,
        payload: Payload,
        tags: Tags,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            source_realm: source_realm.into(),
            timestamp: Utc::now(),
            payload,
            tags,
        }
    }

    /// True if the event carries at least one of `wanted`.
    #[must_use]
    pub fn has_any_tag(&self, wanted: &Tags) -> bool {
        !self.tags.is_disjoint(wanted)
    }
}
