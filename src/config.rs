use crate::api::{DEFAULT_API_BASE, DEFAULT_API_HOST};
use crate::diff::DiffPolicy;
use crate::error::{Result, WatcherError};
use crate::poller::PollConfig;
use crate::types::DeliveryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for every `*_SECS` setting (one year).
const MAX_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    Json { path: PathBuf },
    Sqlite { url: String },
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub rapidapi_key: String,
    pub rapidapi_host: String,
    pub twitter_api_base: String,
    pub include_replies: bool,
    pub storage: StorageKind,
    pub poll: PollConfig,
    pub command_poll_timeout: Duration,
}

impl Config {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| WatcherError::Config(format!("{} is not set", key)))
        };
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match get(key) {
                Some(v) => match v.parse::<u64>() {
                    Ok(n) if n <= MAX_SECS => Ok(Duration::from_secs(n)),
                    Ok(_) => Err(WatcherError::Config(format!("{} must be at most {} seconds", key, MAX_SECS))),
                    Err(_) => Err(WatcherError::Config(format!("{} must be a number of seconds, got {:?}", key, v))),
                },
                None => Ok(Duration::from_secs(default)),
            }
        };
        let flag = |key: &str, default: bool| -> Result<bool> {
            match get(key).map(|v| v.to_ascii_lowercase()) {
                None => Ok(default),
                Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
                Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
                Some(v) => Err(WatcherError::Config(format!("{} must be true or false, got {:?}", key, v))),
            }
        };

        let storage_type = get("STORAGE_TYPE").unwrap_or_else(|| "json".to_string());
        let storage = match storage_type.to_ascii_lowercase().as_str() {
            "json" => StorageKind::Json {
                path: PathBuf::from(get("STATE_FILE").unwrap_or_else(|| "config.json".to_string())),
            },
            "sqlite" => StorageKind::Sqlite {
                url: get("DATABASE_URL").unwrap_or_else(|| "sqlite:watch.db".to_string()),
            },
            "redis" => StorageKind::Redis {
                url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            },
            other => {
                return Err(WatcherError::Config(format!("unknown STORAGE_TYPE {:?}", other)));
            }
        };

        let delivery = match get("DELIVERY_POLICY").map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("advance") => DeliveryPolicy::AdvanceOnFailure,
            Some("retry") => DeliveryPolicy::RetryOnFailure,
            Some(other) => {
                return Err(WatcherError::Config(format!(
                    "DELIVERY_POLICY must be advance or retry, got {:?}",
                    other
                )));
            }
        };

        let interval = secs("POLL_INTERVAL_SECS", 100)?;
        if interval.is_zero() {
            return Err(WatcherError::Config("POLL_INTERVAL_SECS must be positive".to_string()));
        }

        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required("TELEGRAM_CHAT_ID")?,
            rapidapi_key: required("RAPIDAPI_KEY")?,
            rapidapi_host: get("RAPIDAPI_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            twitter_api_base: get("TWITTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            include_replies: flag("INCLUDE_REPLIES", false)?,
            storage,
            poll: PollConfig {
                interval,
                jitter: secs("POLL_JITTER_SECS", 0)?,
                fetch_timeout: secs("FETCH_TIMEOUT_SECS", 20)?,
                diff: DiffPolicy {
                    notify_on_first_poll: flag("NOTIFY_ON_FIRST_POLL", false)?,
                },
                delivery,
            },
            command_poll_timeout: secs("COMMAND_POLL_TIMEOUT_SECS", 30)?,
        })
    }
}
