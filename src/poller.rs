//! Notification poller: periodic refresh of the display feed.
//!
//! DESIGN
//! ======
//! One spawned task refreshes immediately, then on every interval tick,
//! and publishes the result through a `watch` channel. Each refresh
//! replaces the feed wholesale: there is no merge with earlier ticks and no
//! dedup across them. In remote mode dedup is the server's job.
//!
//! ERROR HANDLING
//! ==============
//! A failed remote fetch is logged and publishes an empty feed. It is never
//! fatal; the next tick simply tries again.
//!
//! LIFETIME
//! ========
//! `PollerHandle` owns the task. `shutdown` stops it cooperatively and
//! waits; dropping the handle aborts it, so no refresh runs after the
//! owning view is gone.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::api::ApiClient;
use crate::feed::{Feed, FeedItem};
use crate::ledger::Ledger;

/// Where each refresh reads from. Exactly one per deployment.
pub enum Source {
    Remote(ApiClient),
    Local(Ledger),
}

impl Source {
    fn label(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Local(_) => "local",
        }
    }

    async fn refresh(&self) -> Vec<FeedItem> {
        match self {
            Self::Remote(api) => match api.stock_alerts().await {
                Ok(alerts) => alerts.into_iter().map(FeedItem::from).collect(),
                Err(e) => {
                    error!(error = %e, "stock alert poll failed");
                    Vec::new()
                }
            },
            Self::Local(ledger) => {
                // File-backed ledgers do blocking I/O.
                let ledger = ledger.clone();
                match tokio::task::spawn_blocking(move || ledger.list()).await {
                    Ok(entries) => entries.into_iter().map(FeedItem::from).collect(),
                    Err(e) => {
                        error!(error = %e, "notification ledger read failed");
                        Vec::new()
                    }
                }
            }
        }
    }
}

pub struct PollerHandle {
    feed: watch::Receiver<Feed>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// A receiver that observes every published feed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Feed> {
        self.feed.clone()
    }

    /// The most recently published feed.
    #[must_use]
    pub fn current(&self) -> Feed {
        self.feed.borrow().clone()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Spawn the poller. Must be called inside a Tokio runtime.
pub fn spawn(source: Source, every: Duration) -> PollerHandle {
    let (feed_tx, feed_rx) = watch::channel(Feed::default());
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let interval_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX);
    info!(source = source.label(), interval_ms, "notification poller started");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
            }

            let items = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                items = source.refresh() => items,
            };

            ticks += 1;
            debug!(ticks, count = items.len(), "feed refreshed");
            feed_tx.send_replace(Feed { items, ticks });
        }

        debug!(ticks, "notification poller stopped");
    });

    PollerHandle { feed: feed_rx, shutdown: Some(stop_tx), task: Some(task) }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
