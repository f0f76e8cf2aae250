use anyhow::Result;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tweet_notifier::config::{Config, StorageKind};
use tweet_notifier::database::RedisMarkerStore;
use tweet_notifier::db::SqliteMarkerStore;
use tweet_notifier::json_db::JsonMarkerStore;
use tweet_notifier::telegram::{CommandListener, TelegramClient};
use tweet_notifier::{
    FeedPoller, MarkerStore, SweepStatus, TelegramNotifier, TwitterClient, WatchList,
    WatchListController,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    info!("Starting tweet notifier...");

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let store: Arc<dyn MarkerStore> = match &config.storage {
        StorageKind::Redis { url } => Arc::new(RedisMarkerStore::new(url).await?),
        StorageKind::Sqlite { url } => Arc::new(SqliteMarkerStore::new(url).await?),
        StorageKind::Json { path } => Arc::new(JsonMarkerStore::new(path)),
    };
    store.init().await?;
    info!("Storage backend ready: {:?}", config.storage);

    let watchlist = Arc::new(WatchList::open(store).await);
    let status = Arc::new(SweepStatus::new());

    let telegram = Arc::new(TelegramClient::new(http.clone(), &config.telegram_token));
    let notifier = Arc::new(TelegramNotifier::new(
        telegram.clone(),
        config.telegram_chat_id.clone(),
    ));
    let fetcher = Arc::new(
        TwitterClient::new(http, &config.rapidapi_key)
            .with_base_url(&config.twitter_api_base)
            .with_api_host(&config.rapidapi_host)
            .with_replies(config.include_replies),
    );

    let controller = Arc::new(WatchListController::new(watchlist.clone(), status.clone()));
    let listener = CommandListener::new(telegram, controller, config.command_poll_timeout);
    let poller = FeedPoller::new(watchlist, fetcher, notifier, status, config.poll.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener_rx = shutdown_rx.clone();
    let listener_task = tokio::spawn(async move { listener.run(listener_rx).await });
    let poller_task = tokio::spawn(async move { poller.start_polling(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    for (name, task) in [("command listener", listener_task), ("poller", poller_task)] {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    }

    info!("Tweet notifier stopped");
    Ok(())
}
