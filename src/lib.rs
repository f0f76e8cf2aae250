pub mod api;
pub mod config;
pub mod controller;
pub mod database;
pub mod db;
pub mod diff;
pub mod error;
pub mod feed;
pub mod json_db;
pub mod notifier;
pub mod poller;
pub mod storage;
pub mod telegram;
pub mod types;
pub mod watchlist;

pub use api::TwitterClient;
pub use config::{Config, StorageKind};
pub use controller::{Command, WatchListController};
pub use error::{Result, WatcherError};
pub use feed::FeedFetcher;
pub use notifier::{Notifier, TelegramNotifier};
pub use poller::{FeedPoller, PollConfig, SweepStatus};
pub use storage::MarkerStore;
pub use types::{Decision, DeliveryPolicy, FetchedItem, SweepReport, WatchState};
pub use watchlist::WatchList;
