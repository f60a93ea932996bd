use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use assess_core::model::{AssessmentResult, StatsSnapshot, TopicKey};
use storage::repository::Storage;
use storage::stats_cache::StatsCacheStore;

use crate::Clock;
use crate::config::{GatewayConfig, SyncConfig};
use crate::connectivity::{ConnectivityProbe, StaticProbe, TcpConnectivityProbe};
use crate::content::ContentCatalog;
use crate::error::AppServicesError;
use crate::gateway::{HttpStatsGateway, StatsGateway};
use crate::reconcile::ScoreReconciler;
use crate::sessions::{AssessmentSession, SessionLoopService};
use crate::stats_sync::StatsSynchronizer;

/// Process-wide state: built once at startup, torn down with [`AppServices::shutdown`].
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    stats: StatsSynchronizer,
    sessions: SessionLoopService,
}

impl AppServices {
    /// Wire services over the given collaborators.
    #[must_use]
    pub fn new(
        storage: Storage,
        gateway: Arc<dyn StatsGateway>,
        probe: Arc<dyn ConnectivityProbe>,
        catalog: Arc<dyn ContentCatalog>,
        clock: Clock,
        config: SyncConfig,
    ) -> Self {
        let cache = StatsCacheStore::new(Arc::clone(&storage.kv));
        let stats = StatsSynchronizer::new(
            clock.clone(),
            config,
            cache.clone(),
            Arc::clone(&storage.kv),
            Arc::clone(&gateway),
            probe,
        );
        let sessions = SessionLoopService::new(
            clock,
            catalog,
            Arc::clone(&storage.kv),
            cache,
            gateway,
            stats.clone(),
        );
        Self {
            storage,
            stats,
            sessions,
        }
    }

    /// Build services backed by `SQLite` storage and the HTTP stats service.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or client setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        gateway_config: &GatewayConfig,
        catalog: Arc<dyn ContentCatalog>,
        clock: Clock,
        config: SyncConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let gateway: Arc<dyn StatsGateway> = Arc::new(HttpStatsGateway::new(gateway_config)?);
        let probe: Arc<dyn ConnectivityProbe> = match TcpConnectivityProbe::for_gateway(gateway_config) {
            Some(probe) => Arc::new(probe),
            None => Arc::new(StaticProbe::new(true)),
        };
        Ok(Self::new(storage, gateway, probe, catalog, clock, config))
    }

    /// Load cached stats and start the periodic refresh.
    ///
    /// Returns the handle of the initial refresh, if one was dispatched.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let initial = self.stats.load().await;
        self.stats.spawn_periodic_refresh();
        info!("app services started");
        initial
    }

    /// Stop background refreshes and wait for pending score submissions.
    pub async fn shutdown(&self) {
        self.stats.shutdown().await;
        self.sessions.drain().await;
        info!("app services stopped");
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn stats(&self) -> &StatsSynchronizer {
        &self.stats
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionLoopService {
        &self.sessions
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.stats.subscribe()
    }

    pub async fn refresh_now(&self) -> StatsSnapshot {
        self.stats.refresh_now().await
    }

    #[must_use]
    pub fn start_session(&self, topic: TopicKey) -> AssessmentSession {
        self.sessions.start_session(topic)
    }

    #[must_use]
    pub fn submit_result(&self, result: AssessmentResult) -> ScoreReconciler {
        self.sessions.submit_result(result)
    }
}
