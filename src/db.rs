use crate::error::{Result, WatcherError};
use crate::storage::MarkerStore;
use crate::types::WatchState;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

pub struct SqliteMarkerStore {
    pool: SqlitePool,
}

impl SqliteMarkerStore {
    /// Open a pool against `database_url`, creating the file if missing
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to SQLite: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| WatcherError::Config(format!("Invalid database url: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| WatcherError::Storage(format!("Database connection failed: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MarkerStore for SqliteMarkerStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watch_markers (
                identity TEXT PRIMARY KEY NOT NULL,
                marker TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| WatcherError::Storage(format!("Failed to create watch_markers: {}", e)))?;

        Ok(())
    }

    async fn load(&self) -> Result<WatchState> {
        let rows = sqlx::query("SELECT identity, marker FROM watch_markers")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to read markers: {}", e)))?;

        let state: WatchState = rows
            .iter()
            .map(|row| (row.get::<String, _>("identity"), row.get::<String, _>("marker")))
            .collect();

        info!("Loaded {} tracked accounts from SQLite", state.len());
        Ok(state)
    }

    async fn save(&self, state: &WatchState) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM watch_markers")
            .execute(&mut *tx)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to clear markers: {}", e)))?;

        for (identity, marker) in state.iter() {
            sqlx::query("INSERT INTO watch_markers (identity, marker) VALUES (?, ?)")
                .bind(identity)
                .bind(marker)
                .execute(&mut *tx)
                .await
                .map_err(|e| WatcherError::Storage(format!("Failed to insert marker: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to commit markers: {}", e)))?;

        debug!("Saved {} tracked accounts to SQLite", state.len());
        Ok(())
    }
}
