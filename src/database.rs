use crate::error::{Result, WatcherError};
use crate::storage::MarkerStore;
use crate::types::WatchState;
use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

const MARKERS_KEY: &str = "watch:markers";

/// Redis hash `watch:markers` with one field per identity.
pub struct RedisMarkerStore {
    conn: ConnectionManager,
}

impl RedisMarkerStore {
    /// Connect to Redis at `redis_url`
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis: {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| WatcherError::Config(format!("Invalid Redis url: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| WatcherError::Storage(format!("Redis connection failed: {}", e)))?;

        info!("Redis connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl MarkerStore for RedisMarkerStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn load(&self) -> Result<WatchState> {
        let mut conn = self.conn.clone();
        let markers: HashMap<String, String> = conn
            .hgetall(MARKERS_KEY)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to read markers: {}", e)))?;

        info!("Loaded {} tracked accounts from Redis", markers.len());
        Ok(markers.into_iter().collect())
    }

    async fn save(&self, state: &WatchState) -> Result<()> {
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic().del(MARKERS_KEY).ignore();

        // HSET with no fields is a Redis error
        if !state.is_empty() {
            let fields: Vec<(&str, &str)> = state.iter().collect();
            pipe.hset_multiple(MARKERS_KEY, &fields).ignore();
        }

        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| WatcherError::Storage(format!("Failed to save markers: {}", e)))?;

        debug!("Saved {} tracked accounts to Redis", state.len());
        Ok(())
    }
}
