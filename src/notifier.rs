use crate::error::Result;
use crate::telegram::TelegramClient;
use crate::types::FetchedItem;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one new-post message. Fails with `WatcherError::Delivery`.
    async fn notify(&self, identity: &str, item: &FetchedItem) -> Result<()>;
}

pub fn format_notification(identity: &str, item: &FetchedItem) -> String {
    let mut message = format!("New post from @{}", identity);
    message.push('\n');
    message.push_str(item.url.as_deref().unwrap_or(&item.id));

    if let Some(text) = item.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        message.push_str("\n\n");
        message.push_str(text);
    }

    message
}

/// Sends notifications to a single Telegram chat.
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, identity: &str, item: &FetchedItem) -> Result<()> {
        let text = format_notification(identity, item);
        self.client.send_message(&self.chat_id, &text).await
    }
}
