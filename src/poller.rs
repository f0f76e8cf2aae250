use crate::diff::DiffPolicy;
use crate::error::WatcherError;
use crate::feed::FeedFetcher;
use crate::notifier::Notifier;
use crate::types::{Decision, DeliveryPolicy, SweepReport};
use crate::watchlist::WatchList;
use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Upper bound of the random delay added to every interval.
    pub jitter: Duration,
    pub fetch_timeout: Duration,
    pub diff: DiffPolicy,
    pub delivery: DeliveryPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(100),
            jitter: Duration::ZERO,
            fetch_timeout: Duration::from_secs(20),
            diff: DiffPolicy::default(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

/// `interval` plus a random extra of at most `jitter`, saturating at `Duration::MAX`.
fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return interval;
    }
    let extra = rand::thread_rng().gen_range(0..=jitter_ms);
    interval.saturating_add(Duration::from_millis(extra))
}

/// Last finished sweep, shared with the `status` command.
#[derive(Debug, Default)]
pub struct SweepStatus {
    last: RwLock<Option<SweepReport>>,
}

impl SweepStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: SweepReport) {
        *self.last.write() = Some(report);
    }

    pub fn last(&self) -> Option<SweepReport> {
        self.last.read().clone()
    }
}

pub struct FeedPoller {
    watchlist: Arc<WatchList>,
    fetcher: Arc<dyn FeedFetcher>,
    notifier: Arc<dyn Notifier>,
    status: Arc<SweepStatus>,
    config: PollConfig,
}

impl FeedPoller {
    pub fn new(
        watchlist: Arc<WatchList>,
        fetcher: Arc<dyn FeedFetcher>,
        notifier: Arc<dyn Notifier>,
        status: Arc<SweepStatus>,
        config: PollConfig,
    ) -> Self {
        Self {
            watchlist,
            fetcher,
            notifier,
            status,
            config,
        }
    }

    /// Sweep forever until `shutdown` flips to true.
    pub async fn start_polling(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Polling tracked accounts every {:?} (jitter up to {:?})",
            self.config.interval, self.config.jitter
        );

        loop {
            let report = self.sweep().await;
            if report.notified > 0 || report.fetch_failures > 0 || report.delivery_failures > 0 {
                info!(
                    "Sweep done: {} checked, {} notified, {} fetch failures, {} delivery failures",
                    report.checked, report.notified, report.fetch_failures, report.delivery_failures
                );
            } else {
                debug!("Sweep done: {} checked, nothing new", report.checked);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.next_delay()) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }

        info!("Poller stopped");
    }

    fn next_delay(&self) -> Duration {
        jittered(self.config.interval, self.config.jitter)
    }

    /// One pass over a snapshot of the tracked accounts.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        // accounts added or removed from here on are picked up next sweep
        let identities = self.watchlist.list().await;

        for identity in &identities {
            report.checked += 1;
            self.process(identity, &mut report).await;
        }

        report.finished_at = Some(Utc::now());
        self.status.record(report.clone());
        report
    }

    async fn process(&self, identity: &str, report: &mut SweepReport) {
        let fetched = match tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetcher.fetch_latest(identity),
        )
        .await
        {
            Ok(Ok(item)) => item,
            Ok(Err(e)) => {
                warn!("Skipping {} this sweep: {}", identity, e);
                report.fetch_failures += 1;
                return;
            }
            Err(_) => {
                let e = WatcherError::fetch(
                    identity,
                    format!("timed out after {:?}", self.config.fetch_timeout),
                );
                warn!("Skipping {} this sweep: {}", identity, e);
                report.fetch_failures += 1;
                return;
            }
        };

        let advance_first = self.config.delivery == DeliveryPolicy::AdvanceOnFailure;
        let Some(reconciled) = self
            .watchlist
            .reconcile(identity, fetched.as_ref(), self.config.diff, advance_first)
            .await
        else {
            debug!("{} was removed during the sweep", identity);
            return;
        };

        match reconciled.decision {
            Decision::NoChange => report.unchanged += 1,
            Decision::RecordOnly(id) => {
                info!("First post of {} recorded as {}", identity, id);
                report.recorded += 1;
            }
            Decision::NotifyAndRecord(item) => {
                info!("New post from {}: {}", identity, item.id);
                match self.notifier.notify(identity, &item).await {
                    Ok(()) => {
                        report.notified += 1;
                        if !reconciled.committed {
                            self.watchlist
                                .commit_if_unchanged(identity, &reconciled.previous, &item.id)
                                .await;
                        }
                    }
                    Err(e) => {
                        report.delivery_failures += 1;
                        if reconciled.committed {
                            error!("Notification for {} lost: {}", identity, e);
                        } else {
                            error!("Notification for {} failed, retrying next sweep: {}", identity, e);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bound() {
        let interval = Duration::from_secs(100);
        assert_eq!(jittered(interval, Duration::ZERO), interval);
        for _ in 0..50 {
            let delay = jittered(interval, Duration::from_secs(5));
            assert!(delay >= interval);
            assert!(delay <= interval + Duration::from_secs(5));
        }
    }

    #[test]
    fn huge_jitter_saturates() {
        let delay = jittered(Duration::MAX, Duration::MAX);
        assert_eq!(delay, Duration::MAX);
    }
}
