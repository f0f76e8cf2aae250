use crate::error::{Result, WatcherError};
use crate::storage::MarkerStore;
use crate::types::WatchState;
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Flat JSON object on disk: `{"identity": "marker", ...}`.
pub struct JsonMarkerStore {
    path: PathBuf,
}

impl JsonMarkerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl MarkerStore for JsonMarkerStore {
    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    WatcherError::Storage(format!("Failed to create data directory: {}", e))
                })?;
            }
        }
        Ok(())
    }

    async fn load(&self) -> Result<WatchState> {
        if !self.path.exists() {
            info!("No state file at {}, starting empty", self.path.display());
            return Ok(WatchState::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to read state file: {}", e)))?;

        if content.trim().is_empty() {
            return Ok(WatchState::new());
        }

        let state: WatchState = serde_json::from_str(&content).map_err(|e| {
            WatcherError::Storage(format!("Malformed state file {}: {}", self.path.display(), e))
        })?;

        info!("Loaded {} tracked accounts from disk", state.len());
        Ok(state)
    }

    async fn save(&self, state: &WatchState) -> Result<()> {
        let temp_path = self.temp_path();
        let json = serde_json::to_string_pretty(state)?;

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to create temp file: {}", e)))?;

        file.write_all(json.as_bytes())
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to write to temp file: {}", e)))?;

        file.flush()
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to flush temp file: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to sync temp file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to rename temp file: {}", e)))?;

        debug!("Saved {} tracked accounts to {}", state.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn sample() -> WatchState {
        vec![
            ("alice".to_string(), "T1".to_string()),
            ("bob".to_string(), String::new()),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMarkerStore::new(dir.path().join("state.json"));
        let state = store.load().await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMarkerStore::new(dir.path().join("state.json"));
        let state = sample();

        assert_ok!(store.save(&state).await);
        assert_eq!(store.load().await.unwrap(), state);

        let reopened = JsonMarkerStore::new(dir.path().join("state.json"));
        assert_eq!(reopened.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMarkerStore::new(dir.path().join("state.json"));
        store.save(&sample()).await.unwrap();
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn reads_flat_object_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"alice":"T1","bob":""}"#).unwrap();

        let state = JsonMarkerStore::new(&path).load().await.unwrap();
        assert_eq!(state, sample());
    }

    #[tokio::test]
    async fn malformed_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = assert_err!(JsonMarkerStore::new(&path).load().await);
        assert!(matches!(err, WatcherError::Storage(_)));

        let state = crate::storage::load_or_default(&JsonMarkerStore::new(&path)).await;
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn init_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMarkerStore::new(dir.path().join("nested/state.json"));
        store.init().await.unwrap();
        store.save(&sample()).await.unwrap();
        assert!(dir.path().join("nested/state.json").exists());
    }
}
