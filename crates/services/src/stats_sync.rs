//! Cache-aside synchronization of topic stats.
//!
//! The synchronizer owns the single published [`StatsSnapshot`]. It serves
//! whatever the durable cache holds immediately, then refreshes from the
//! remote gateway when the cache is missing or stale, and keeps a periodic
//! timer running that repeats the staleness check until shutdown.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use assess_core::Clock;
use assess_core::model::{StatsSnapshot, SyncStatus, TopicStat, is_stale, merge_remote};
use storage::repository::{KeyValueStore, keys};
use storage::stats_cache::StatsCacheStore;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityProbe;
use crate::error::SyncError;
use crate::gateway::StatsGateway;

/// Keeps the published stats snapshot in sync with the remote service.
#[derive(Clone)]
pub struct StatsSynchronizer {
    clock: Clock,
    config: SyncConfig,
    cache: StatsCacheStore,
    kv: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn StatsGateway>,
    probe: Arc<dyn ConnectivityProbe>,
    snapshot: Arc<watch::Sender<StatsSnapshot>>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl StatsSynchronizer {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: SyncConfig,
        cache: StatsCacheStore,
        kv: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn StatsGateway>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let (snapshot, _) = watch::channel(StatsSnapshot::loading());
        Self {
            clock,
            config,
            cache,
            kv,
            gateway,
            probe,
            snapshot: Arc::new(snapshot),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Observe every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot.subscribe()
    }

    /// Publish the cached record, then dispatch a refresh if it is missing or stale.
    ///
    /// The cache-read phase always finishes publishing before the refresh is
    /// spawned. Returns the handle of the dispatched refresh, if any.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<JoinHandle<()>> {
        match self.cache.read().await {
            Ok(Some(record)) => {
                let stale = is_stale(record.updated_at, self.clock.now(), self.config.stale_after());
                let status = if stale {
                    SyncStatus::Cached
                } else {
                    SyncStatus::Updated
                };
                debug!(?status, "serving cached stats");
                self.publish(StatsSnapshot {
                    data: record.stats,
                    status,
                    last_updated_at: record.updated_at,
                });
                if stale { self.spawn_refresh(true) } else { None }
            }
            Ok(None) => {
                debug!("no cached stats");
                self.spawn_refresh(false)
            }
            Err(err) => {
                warn!(error = %err, "cached stats unreadable");
                self.publish_error(&err.to_string());
                self.spawn_refresh(false)
            }
        }
    }

    /// Fetch remote stats and publish the outcome.
    ///
    /// `has_cached_data` controls whether an `Updating` status is shown while
    /// the fetch is in flight. Failures are published, never returned.
    #[instrument(skip(self))]
    pub async fn refresh(&self, has_cached_data: bool) -> StatsSnapshot {
        if !self.probe.is_online().await {
            info!("offline, keeping current stats");
            self.snapshot.send_modify(|current| {
                current.data = current.data_or_catalog();
                current.status = SyncStatus::Offline;
            });
            return self.snapshot();
        }

        if has_cached_data {
            self.snapshot
                .send_modify(|current| current.status = SyncStatus::Updating);
        }

        match self.fetch_and_store().await {
            Ok((data, at)) => {
                info!(topics = data.len(), "stats refreshed");
                self.publish(StatsSnapshot {
                    data,
                    status: SyncStatus::Updated,
                    last_updated_at: Some(at),
                });
            }
            Err(err) => {
                warn!(error = %err, "stats refresh failed");
                self.publish_error(&err.to_string());
            }
        }
        self.snapshot()
    }

    /// User-triggered refresh, regardless of staleness.
    pub async fn refresh_now(&self) -> StatsSnapshot {
        self.refresh(true).await
    }

    /// Refresh only when the cache record is stale. Returns whether a refresh ran.
    pub async fn refresh_if_stale(&self) -> bool {
        let updated_at = match self.cache.updated_at().await {
            Ok(at) => at,
            Err(err) => {
                warn!(error = %err, "cache timestamp unreadable, treating as stale");
                None
            }
        };
        if !is_stale(updated_at, self.clock.now(), self.config.stale_after()) {
            debug!("cached stats still fresh");
            return false;
        }
        self.refresh(true).await;
        true
    }

    /// Start the periodic staleness check. It runs until [`Self::shutdown`].
    pub fn spawn_periodic_refresh(&self) -> Option<JoinHandle<()>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let this = self.clone();
        let period = self.config.refresh_interval();
        Some(self.tasks.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = this.shutdown.cancelled() => {
                        debug!("periodic refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        this.refresh_if_stale().await;
                    }
                }
            }
        }))
    }

    /// Replace the published list after a local cache write, keeping the status.
    pub fn apply_local_update(&self, data: Vec<TopicStat>, at: DateTime<Utc>) {
        self.snapshot.send_modify(|current| {
            current.data = data;
            current.last_updated_at = Some(at);
        });
    }

    /// Stop the timer and any in-flight refresh, then wait for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    fn spawn_refresh(&self, has_cached_data: bool) -> Option<JoinHandle<()>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let this = self.clone();
        Some(self.tasks.spawn(async move {
            tokio::select! {
                () = this.shutdown.cancelled() => {}
                _ = this.refresh(has_cached_data) => {}
            }
        }))
    }

    async fn fetch_and_store(&self) -> Result<(Vec<TopicStat>, DateTime<Utc>), SyncError> {
        let token = self
            .kv
            .get_string(keys::AUTH_TOKEN)
            .await?
            .unwrap_or_default();
        let remote = self.gateway.fetch_stats(&token).await?;
        let published = self.snapshot.borrow().data.clone();
        let at = self.clock.now();
        // The cached list is the base so topics the remote omits keep their
        // cached values. A topic the remote does report takes the remote
        // values, even over a local raise written while the fetch was in flight.
        let merged = self
            .cache
            .replace_with(at, |cached| {
                merge_remote(cached.as_deref().unwrap_or(published.as_slice()), &remote)
            })
            .await?;
        Ok((merged, at))
    }

    fn publish(&self, snapshot: StatsSnapshot) {
        self.snapshot.send_replace(snapshot);
    }

    fn publish_error(&self, message: &str) {
        self.snapshot.send_modify(|current| {
            current.data = current.data_or_catalog();
            current.status = SyncStatus::Error {
                message: message.to_owned(),
            };
        });
    }
}
