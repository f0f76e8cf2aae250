use crate::error::Result;
use crate::types::WatchState;
use async_trait::async_trait;
use log::warn;

#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Initialize the storage (e.g. create tables, ensure directories exist)
    async fn init(&self) -> Result<()>;

    /// Read the persisted state. Missing state is an empty `WatchState`.
    async fn load(&self) -> Result<WatchState>;

    /// Replace the persisted state with a full snapshot
    async fn save(&self, state: &WatchState) -> Result<()>;
}

/// Load the persisted state, falling back to empty on unreadable data.
pub async fn load_or_default(store: &dyn MarkerStore) -> WatchState {
    match store.load().await {
        Ok(state) => state,
        Err(e) => {
            warn!("Failed to load watch state, starting empty: {}", e);
            WatchState::new()
        }
    }
}
