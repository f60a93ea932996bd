use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use assess_core::Clock;
use assess_core::model::{AssessmentResult, TopicKey};
use storage::repository::KeyValueStore;
use storage::stats_cache::StatsCacheStore;

use super::service::AssessmentSession;
use crate::content::ContentCatalog;
use crate::error::SessionError;
use crate::gateway::StatsGateway;
use crate::reconcile::ScoreReconciler;
use crate::stats_sync::StatsSynchronizer;

/// Orchestrates session start and result submission.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    catalog: Arc<dyn ContentCatalog>,
    kv: Arc<dyn KeyValueStore>,
    cache: StatsCacheStore,
    gateway: Arc<dyn StatsGateway>,
    stats: StatsSynchronizer,
    submissions: TaskTracker,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn ContentCatalog>,
        kv: Arc<dyn KeyValueStore>,
        cache: StatsCacheStore,
        gateway: Arc<dyn StatsGateway>,
        stats: StatsSynchronizer,
    ) -> Self {
        Self {
            clock,
            catalog,
            kv,
            cache,
            gateway,
            stats,
            submissions: TaskTracker::new(),
        }
    }

    /// Open a session over the topic's questions. Timing starts on `start()`.
    #[must_use]
    pub fn start_session(&self, topic: TopicKey) -> AssessmentSession {
        let screens = self.catalog.questions_for(topic);
        let session = AssessmentSession::new(topic, screens, self.clock.clone());
        debug!(session = %session.id(), %topic, screens = session.total_questions(), "session opened");
        session
    }

    /// Open a session from a raw topic key.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownTopic` if the key names no topic.
    pub fn start_session_by_key(&self, raw: &str) -> Result<AssessmentSession, SessionError> {
        let topic: TopicKey = raw
            .parse()
            .map_err(|_| SessionError::UnknownTopic(raw.to_owned()))?;
        Ok(self.start_session(topic))
    }

    /// Build a reconciler for `result` without submitting it.
    #[must_use]
    pub fn reconciler(&self, result: AssessmentResult) -> ScoreReconciler {
        ScoreReconciler::new(
            result,
            self.clock.clone(),
            Arc::clone(&self.kv),
            self.cache.clone(),
            Arc::clone(&self.gateway),
            self.stats.clone(),
        )
    }

    /// Start submitting `result` in the background and return its reconciler.
    ///
    /// The submission runs to completion even if the caller drops the handle.
    #[must_use]
    pub fn submit_result(&self, result: AssessmentResult) -> ScoreReconciler {
        let reconciler = self.reconciler(result);
        let task = reconciler.clone();
        info!(
            topic = %task.result().topic_key(),
            improvement = task.improvement(),
            "submitting assessment result"
        );
        self.submissions.spawn(async move {
            // Failures are recorded in the reconciler state.
            let _ = task.submit().await;
        });
        reconciler
    }

    /// Wait for every background submission to finish.
    pub async fn drain(&self) {
        self.submissions.close();
        self.submissions.wait().await;
    }
}
