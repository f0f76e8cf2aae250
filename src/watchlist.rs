//! Owner of the shared `WatchState`.
//!
//! Every read-decide-write runs under one async mutex, and the snapshot is
//! saved before the lock is released, so saves never overlap. Fetch and
//! notify happen in the poller between calls, never under the lock.

use crate::diff::{decide, DiffPolicy};
use crate::storage::{load_or_default, MarkerStore};
use crate::types::{AddOutcome, Decision, FetchedItem, RemoveOutcome, WatchState};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of deciding on a fetched item against the current marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub decision: Decision,
    /// Marker the decision was made against.
    pub previous: String,
    /// Whether the new marker was already written.
    pub committed: bool,
}

pub struct WatchList {
    state: Mutex<WatchState>,
    store: Arc<dyn MarkerStore>,
}

impl WatchList {
    pub fn new(state: WatchState, store: Arc<dyn MarkerStore>) -> Self {
        Self {
            state: Mutex::new(state),
            store,
        }
    }

    /// Load persisted state from `store`, starting empty if it is unreadable.
    pub async fn open(store: Arc<dyn MarkerStore>) -> Self {
        let state = load_or_default(store.as_ref()).await;
        info!("Watching {} accounts", state.len());
        Self::new(state, store)
    }

    pub async fn add(&self, identity: &str) -> AddOutcome {
        let mut state = self.state.lock().await;
        if !state.track(identity) {
            return AddOutcome::AlreadyTracked;
        }
        info!("Now tracking {}", identity);
        self.persist(&state).await;
        AddOutcome::Added
    }

    pub async fn remove(&self, identity: &str) -> RemoveOutcome {
        let mut state = self.state.lock().await;
        if !state.untrack(identity) {
            return RemoveOutcome::NotTracked;
        }
        info!("Stopped tracking {}", identity);
        self.persist(&state).await;
        RemoveOutcome::Removed
    }

    pub async fn list(&self) -> Vec<String> {
        self.state.lock().await.identities()
    }

    pub async fn snapshot(&self) -> WatchState {
        self.state.lock().await.clone()
    }

    pub async fn marker(&self, identity: &str) -> Option<String> {
        self.state.lock().await.marker(identity).map(str::to_string)
    }

    /// Decide on `fetched` against the identity's current marker and record it.
    ///
    /// `RecordOnly` is always committed. `NotifyAndRecord` is committed now only
    /// when `commit_notify` is set; otherwise the caller commits after delivery
    /// with [`WatchList::commit_if_unchanged`]. Returns `None` if the identity
    /// is no longer tracked.
    pub async fn reconcile(
        &self,
        identity: &str,
        fetched: Option<&FetchedItem>,
        policy: DiffPolicy,
        commit_notify: bool,
    ) -> Option<Reconciled> {
        let mut state = self.state.lock().await;
        let previous = state.marker(identity)?.to_string();
        let decision = decide(&previous, fetched, policy);

        let new_marker = match &decision {
            Decision::NoChange => None,
            Decision::RecordOnly(id) => Some(id.clone()),
            Decision::NotifyAndRecord(item) if commit_notify => Some(item.id.clone()),
            Decision::NotifyAndRecord(_) => None,
        };

        let committed = match new_marker {
            Some(marker) => {
                state.set_marker(identity, &marker);
                debug!("Marker for {}: {:?} -> {:?}", identity, previous, marker);
                self.persist(&state).await;
                true
            }
            None => false,
        };

        Some(Reconciled {
            decision,
            previous,
            committed,
        })
    }

    /// Set the marker only if it still equals `expected`.
    ///
    /// Guards against a remove/re-add or another update between decision and commit.
    pub async fn commit_if_unchanged(&self, identity: &str, expected: &str, marker: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.marker(identity) != Some(expected) {
            debug!("Marker for {} changed since decision, skipping commit", identity);
            return false;
        }
        state.set_marker(identity, marker);
        self.persist(&state).await;
        true
    }

    /// Save failures keep the in-memory state; a crash before the next
    /// successful save can re-notify.
    async fn persist(&self, state: &WatchState) {
        if let Err(e) = self.store.save(state).await {
            error!("Failed to persist watch state: {}", e);
        }
    }
}
