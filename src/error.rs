use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("fetch failed for {identity}: {cause}")]
    Fetch { identity: String, cause: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

impl WatcherError {
    pub fn fetch(identity: &str, cause: impl ToString) -> Self {
        WatcherError::Fetch {
            identity: identity.to_string(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WatcherError>;
