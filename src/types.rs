use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted mapping of tracked identity -> last seen item id.
///
/// An empty marker means the identity was added but never polled.
/// Identities are compared case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchState {
    markers: BTreeMap<String, String>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.markers.contains_key(identity)
    }

    pub fn marker(&self, identity: &str) -> Option<&str> {
        self.markers.get(identity).map(String::as_str)
    }

    /// Insert with an empty marker. Returns false if already tracked.
    pub fn track(&mut self, identity: &str) -> bool {
        if self.markers.contains_key(identity) {
            return false;
        }
        self.markers.insert(identity.to_string(), String::new());
        true
    }

    pub fn untrack(&mut self, identity: &str) -> bool {
        self.markers.remove(identity).is_some()
    }

    /// Overwrite the marker of an already tracked identity.
    pub fn set_marker(&mut self, identity: &str, marker: &str) -> bool {
        match self.markers.get_mut(identity) {
            Some(current) => {
                *current = marker.to_string();
                true
            }
            None => false,
        }
    }

    pub fn identities(&self) -> Vec<String> {
        self.markers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.markers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl FromIterator<(String, String)> for WatchState {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            markers: iter.into_iter().collect(),
        }
    }
}

/// Latest item returned by a feed fetch. Only `id` is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedItem {
    pub id: String,
    pub text: Option<String>,
    pub url: Option<String>,
}

impl FetchedItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            url: None,
        }
    }
}

/// Outcome of comparing a fetched item with the stored marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoChange,
    RecordOnly(String),
    NotifyAndRecord(FetchedItem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotTracked,
}

/// What to do with the marker when a notification could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Commit the marker before delivering; a failed delivery is lost.
    #[default]
    AdvanceOnFailure,
    /// Commit only after a successful delivery; the next sweep retries.
    RetryOnFailure,
}

/// Counters for one sweep over all tracked identities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub checked: usize,
    pub notified: usize,
    pub recorded: usize,
    pub unchanged: usize,
    pub fetch_failures: usize,
    pub delivery_failures: usize,
}
