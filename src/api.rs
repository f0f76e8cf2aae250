use crate::error::{Result, WatcherError};
use crate::feed::FeedFetcher;
use crate::types::FetchedItem;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://twitter154.p.rapidapi.com";
pub const DEFAULT_API_HOST: &str = "twitter154.p.rapidapi.com";
const TWEET_URL_BASE: &str = "https://twitter.com";

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    results: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    tweet_id: String,
    #[serde(default)]
    text: Option<String>,
}

/// RapidAPI `twitter154` client.
pub struct TwitterClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    include_replies: bool,
}

impl TwitterClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            include_replies: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    pub fn with_replies(mut self, include_replies: bool) -> Self {
        self.include_replies = include_replies;
        self
    }

    /// Fetch the newest tweet of `username`
    async fn get_latest_tweet(&self, username: &str) -> Result<Option<Tweet>> {
        let url = format!("{}/user/tweets", self.base_url);

        debug!("Requesting latest tweet for {}", username);

        let response = self
            .client
            .get(&url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .query(&[
                ("username", username),
                ("limit", "1"),
                ("include_replies", if self.include_replies { "true" } else { "false" }),
                ("include_pinned", "false"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Twitter API request failed [{}]: {}", status, text);
            return Err(WatcherError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let body: TweetsResponse = response.json().await?;
        Ok(body.results.into_iter().next())
    }
}

#[async_trait]
impl FeedFetcher for TwitterClient {
    async fn fetch_latest(&self, identity: &str) -> Result<Option<FetchedItem>> {
        let tweet = self
            .get_latest_tweet(identity)
            .await
            .map_err(|e| WatcherError::fetch(identity, e))?;

        Ok(tweet.map(|tweet| FetchedItem {
            url: Some(format!("{}/{}/status/{}", TWEET_URL_BASE, identity, tweet.tweet_id)),
            id: tweet.tweet_id,
            text: tweet.text,
        }))
    }
}
