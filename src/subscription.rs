//! Subscription types and filter semantics.
//!
//! These types are intentionally serializable so protocol layers can echo
//! registered subscriptions back to observers in introspection responses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Exact-match narrowing criteria attached to a subscription.
///
/// An ordered map keeps Debug output and serialization deterministic.
pub type FilterMap = BTreeMap<String, Value>;

/// A registered interest in one resource category.
///
/// Immutable after creation; owned by the registry until unsubscribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique id, generated on creation.
    pub id: SubscriptionId,
    /// The observer that owns this subscription.
    pub observer: String,
    /// Resource category path, e.g. `state/refs` or `components`.
    pub target: String,
    /// Optional exact-match narrowing filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterMap>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub(crate) fn new(
        observer: impl Into<String>,
        target: impl Into<String>,
        filter: Option<FilterMap>,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            observer: observer.into(),
            target: target.into(),
            filter,
            created_at: Utc::now(),
        }
    }

    /// True when this subscription covers the given resource category.
    ///
    /// Matching is prefix-based: a subscription to `components` covers both
    /// `components/mounted` and `components/unmounted`; a subscription to
    /// `state` covers every state category.
    #[must_use]
    pub fn covers(&self, category: &str) -> bool {
        category.starts_with(self.target.as_str())
    }

    /// True when the filter accepts the given change summary.
    #[must_use]
    pub fn filter_accepts(&self, summary: &BTreeMap<String, Value>) -> bool {
        filter_matches(self.filter.as_ref(), summary)
    }
}

/// Filter equality used for duplicate-subscription detection.
///
/// Two filters are equal when both are absent/empty, or both are non-empty
/// with identical key sets and scalar-equal values per key.
#[must_use]
pub fn filters_equal(a: Option<&FilterMap>, b: Option<&FilterMap>) -> bool {
    match (normalize(a), normalize(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, va)| b.get(key).is_some_and(|vb| va.scalar_eq(vb)))
        }
        _ => false,
    }
}

/// Filter matching against a change summary.
///
/// An absent/empty filter matches everything. Otherwise every filter key must
/// be present in the summary with a scalar-equal value; extra summary keys
/// are ignored, an unknown filter key fails the match.
#[must_use]
pub fn filter_matches(filter: Option<&FilterMap>, summary: &BTreeMap<String, Value>) -> bool {
    let Some(filter) = normalize(filter) else {
        return true;
    };
    filter
        .iter()
        .all(|(key, expected)| summary.get(key).is_some_and(|got| expected.scalar_eq(got)))
}

fn normalize(filter: Option<&FilterMap>) -> Option<&FilterMap> {
    filter.filter(|map| !map.is_empty())
}
