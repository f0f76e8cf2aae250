use crate::error::Result;
use crate::types::FetchedItem;
use async_trait::async_trait;

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Newest item posted by `identity`, or `None` if the account has no posts.
    ///
    /// Failures must be reported as `WatcherError::Fetch` for that identity.
    async fn fetch_latest(&self, identity: &str) -> Result<Option<FetchedItem>>;
}
