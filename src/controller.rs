use crate::poller::SweepStatus;
use crate::types::{AddOutcome, RemoveOutcome};
use crate::watchlist::WatchList;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    List,
    Status,
    /// A known command missing its account argument.
    Usage(&'static str),
}

impl Command {
    /// Parse `add <id>`, `remove <id>`, `list` or `status`.
    ///
    /// The leading `/` and a `@botname` suffix on the command word are optional.
    /// Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };
        let word = word.strip_prefix('/').unwrap_or(word);
        let word = word.split('@').next().unwrap_or(word);

        match word.to_ascii_lowercase().as_str() {
            "add" => Some(match normalize_identity(rest) {
                Some(id) => Command::Add(id),
                None => Command::Usage("Usage: /add <account>"),
            }),
            "remove" => Some(match normalize_identity(rest) {
                Some(id) => Command::Remove(id),
                None => Command::Usage("Usage: /remove <account>"),
            }),
            "list" if rest.is_empty() => Some(Command::List),
            "status" if rest.is_empty() => Some(Command::Status),
            _ => None,
        }
    }
}

/// Strip one leading `@`; case is kept as typed.
fn normalize_identity(raw: &str) -> Option<String> {
    let id = raw.trim();
    let id = id.strip_prefix('@').unwrap_or(id).trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    Some(id.to_string())
}

pub struct WatchListController {
    watchlist: Arc<WatchList>,
    status: Arc<SweepStatus>,
}

impl WatchListController {
    pub fn new(watchlist: Arc<WatchList>, status: Arc<SweepStatus>) -> Self {
        Self { watchlist, status }
    }

    /// Reply text for a chat message, or `None` if it is not a command.
    pub async fn handle_text(&self, text: &str) -> Option<String> {
        let command = Command::parse(text)?;
        Some(self.execute(command).await)
    }

    pub async fn execute(&self, command: Command) -> String {
        match command {
            Command::Add(id) => match self.watchlist.add(&id).await {
                AddOutcome::Added => format!("Account {} added to the watch list.", id),
                AddOutcome::AlreadyTracked => format!("Account {} is already tracked.", id),
            },
            Command::Remove(id) => match self.watchlist.remove(&id).await {
                RemoveOutcome::Removed => format!("Account {} removed from the watch list.", id),
                RemoveOutcome::NotTracked => format!("Account {} is not tracked.", id),
            },
            Command::List => {
                let ids = self.watchlist.list().await;
                if ids.is_empty() {
                    "The watch list is empty.".to_string()
                } else {
                    format!("Tracked accounts:\n{}", ids.join("\n"))
                }
            }
            Command::Status => match self.status.last() {
                Some(report) => format!(
                    "Last sweep{}: {} checked, {} notified, {} first posts recorded, {} fetch failures, {} delivery failures.",
                    report
                        .finished_at
                        .map(|t| format!(" at {}", t.format("%Y-%m-%d %H:%M:%S UTC")))
                        .unwrap_or_default(),
                    report.checked,
                    report.notified,
                    report.recorded,
                    report.fetch_failures,
                    report.delivery_failures
                ),
                None => "No sweep has finished yet.".to_string(),
            },
            Command::Usage(usage) => usage.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_db::JsonMarkerStore;

    #[test]
    fn parses_commands_with_and_without_slash() {
        assert_eq!(Command::parse("/add alice"), Some(Command::Add("alice".into())));
        assert_eq!(Command::parse("add @alice"), Some(Command::Add("alice".into())));
        assert_eq!(Command::parse("/remove  bob "), Some(Command::Remove("bob".into())));
        assert_eq!(Command::parse("/list@WatchBot"), Some(Command::List));
        assert_eq!(Command::parse("list"), Some(Command::List));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
    }

    #[test]
    fn keeps_identity_case() {
        assert_eq!(Command::parse("/add Alice"), Some(Command::Add("Alice".into())));
    }

    #[test]
    fn missing_argument_is_usage() {
        assert!(matches!(Command::parse("/add"), Some(Command::Usage(_))));
        assert!(matches!(Command::parse("/remove @"), Some(Command::Usage(_))));
        assert!(matches!(Command::parse("/add two words"), Some(Command::Usage(_))));
    }

    #[test]
    fn unrecognized_text_is_ignored() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("/adder alice"), None);
        assert_eq!(Command::parse("list everything"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn replies_follow_watch_list_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonMarkerStore::new(dir.path().join("state.json")));
        let watchlist = Arc::new(WatchList::open(store).await);
        let controller = WatchListController::new(watchlist, Arc::new(SweepStatus::new()));

        assert_eq!(
            controller.handle_text("/list").await.unwrap(),
            "The watch list is empty."
        );
        assert_eq!(
            controller.handle_text("/add alice").await.unwrap(),
            "Account alice added to the watch list."
        );
        assert_eq!(
            controller.handle_text("/add alice").await.unwrap(),
            "Account alice is already tracked."
        );
        controller.handle_text("/add bob").await;
        assert_eq!(
            controller.handle_text("/list").await.unwrap(),
            "Tracked accounts:\nalice\nbob"
        );
        assert_eq!(
            controller.handle_text("/remove carol").await.unwrap(),
            "Account carol is not tracked."
        );
        assert_eq!(
            controller.handle_text("/remove alice").await.unwrap(),
            "Account alice removed from the watch list."
        );
        assert_eq!(
            controller.handle_text("/status").await.unwrap(),
            "No sweep has finished yet."
        );
        assert!(controller.handle_text("good morning").await.is_none());
    }
}
