use crate::controller::WatchListController;
use crate::error::{Result, WatcherError};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    base_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(client: Client, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// Send a plain text message
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "disable_web_page_preview": false
            }))
            .send()
            .await
            .map_err(|e| WatcherError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(WatcherError::Delivery(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let resp = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout.as_secs().to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            // must outlive the server-side long poll
            .timeout(timeout.saturating_add(Duration::from_secs(10)))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(WatcherError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let body: ApiResponse<Vec<Update>> = resp.json().await?;
        if !body.ok {
            return Err(WatcherError::InvalidResponse(
                body.description.unwrap_or_else(|| "getUpdates failed".to_string()),
            ));
        }

        Ok(body.result.unwrap_or_default())
    }
}

/// Receives chat commands and answers them through the controller.
pub struct CommandListener {
    client: Arc<TelegramClient>,
    controller: Arc<WatchListController>,
    poll_timeout: Duration,
}

impl CommandListener {
    pub fn new(
        client: Arc<TelegramClient>,
        controller: Arc<WatchListController>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            controller,
            poll_timeout,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Listening for chat commands");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                res = self.client.get_updates(offset, self.poll_timeout) => res,
                _ = shutdown.changed() => break,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    warn!("Failed to receive updates: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        self.confirm(offset).await;
        info!("Command listener stopped");
    }

    /// Acknowledge everything before `offset` so a restart does not replay it.
    async fn confirm(&self, offset: i64) {
        if offset == 0 {
            return;
        }
        match self.client.get_updates(offset, Duration::ZERO).await {
            Ok(_) => debug!("Confirmed updates before {}", offset),
            Err(e) => warn!("Failed to confirm updates before {}: {}", offset, e),
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text else {
            return;
        };

        let Some(reply) = self.controller.handle_text(&text).await else {
            debug!("Ignoring non-command message in chat {}", message.chat.id);
            return;
        };

        let chat_id = message.chat.id.to_string();
        if let Err(e) = self.client.send_message(&chat_id, &reply).await {
            error!("Failed to reply in chat {}: {}", chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_db::JsonMarkerStore;
    use crate::poller::SweepStatus;
    use crate::watchlist::WatchList;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(Client::new(), "TOKEN").with_base_url(server.uri())
    }

    async fn listener_for(server: &MockServer, dir: &tempfile::TempDir) -> CommandListener {
        let store = Arc::new(JsonMarkerStore::new(dir.path().join("state.json")));
        let watchlist = Arc::new(WatchList::open(store).await);
        let controller = Arc::new(WatchListController::new(watchlist, Arc::new(SweepStatus::new())));
        CommandListener::new(Arc::new(client_for(server)), controller, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn send_message_posts_chat_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "-100123",
                "text": "hi"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).send_message("-100123", "hi").await.unwrap();
    }

    #[tokio::test]
    async fn send_message_failure_is_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bot was kicked"))
            .mount(&server)
            .await;

        let err = client_for(&server).send_message("1", "hi").await.unwrap_err();
        assert!(matches!(err, WatcherError::Delivery(_)));
    }

    #[tokio::test]
    async fn get_updates_parses_text_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {"update_id": 7, "message": {"message_id": 1, "chat": {"id": 42}, "text": "/list"}},
                    {"update_id": 8, "edited_message": {"message_id": 1, "chat": {"id": 42}}}
                ]
            })))
            .mount(&server)
            .await;

        let updates = client_for(&server)
            .get_updates(7, Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/list"));
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn get_updates_not_ok_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Conflict"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_updates(0, Duration::from_secs(0))
            .await
            .unwrap_err();
        assert!(matches!(err, WatcherError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn shutdown_confirms_handled_updates() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {"update_id": 5, "message": {"message_id": 1, "chat": {"id": 42}, "text": "/list"}}
                ]
            })))
            .mount(&server)
            .await;
        // long poll that is still pending when shutdown arrives
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "6"))
            .and(query_param("timeout", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "6"))
            .and(query_param("timeout", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "result": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "The watch list is empty."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let listener = listener_for(&server, &dir).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { listener.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("listener must stop on shutdown")
            .unwrap();
    }
}
