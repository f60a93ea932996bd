//! Reconciliation of a finished attempt with cached and remote history.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use assess_core::Clock;
use assess_core::model::{AssessmentResult, SubmissionState};
use storage::repository::{KeyValueStore, keys};
use storage::stats_cache::StatsCacheStore;

use crate::error::SubmissionError;
use crate::gateway::StatsGateway;
use crate::stats_sync::StatsSynchronizer;

/// Submits one `AssessmentResult` and folds it into the local cache.
///
/// At most one submission is in flight per reconciler; clones share the
/// same state. The cached highest score for the topic is only ever raised.
#[derive(Clone)]
pub struct ScoreReconciler {
    result: AssessmentResult,
    previous_high_score: u32,
    clock: Clock,
    kv: Arc<dyn KeyValueStore>,
    cache: StatsCacheStore,
    gateway: Arc<dyn StatsGateway>,
    stats: StatsSynchronizer,
    state: Arc<watch::Sender<SubmissionState>>,
}

impl ScoreReconciler {
    /// Capture the previous high score from the published snapshot.
    ///
    /// No I/O happens here, so improvement can be shown right away.
    #[must_use]
    pub fn new(
        result: AssessmentResult,
        clock: Clock,
        kv: Arc<dyn KeyValueStore>,
        cache: StatsCacheStore,
        gateway: Arc<dyn StatsGateway>,
        stats: StatsSynchronizer,
    ) -> Self {
        let previous_high_score = stats
            .snapshot()
            .topic(result.topic_key())
            .and_then(|stat| stat.highest_score)
            .unwrap_or(0);
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            result,
            previous_high_score,
            clock,
            kv,
            cache,
            gateway,
            stats,
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn result(&self) -> &AssessmentResult {
        &self.result
    }

    #[must_use]
    pub fn previous_high_score(&self) -> u32 {
        self.previous_high_score
    }

    /// New score minus the previous high score; negative for a regression.
    #[must_use]
    pub fn improvement(&self) -> i64 {
        i64::from(self.result.score_percent()) - i64::from(self.previous_high_score)
    }

    #[must_use]
    pub fn is_improvement(&self) -> bool {
        self.improvement() > 0
    }

    #[must_use]
    pub fn state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Wait until the submission reaches `Success` or `Error`.
    pub async fn wait_finished(&self) -> SubmissionState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Submit the score, then raise the cached high score if it improved.
    ///
    /// Only an `Idle` reconciler submits; any other state returns it unchanged
    /// without contacting the gateway.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` when the submission fails; the state is then `Error`.
    #[instrument(skip(self), fields(topic = %self.result.topic_key(), score = self.result.score_percent()))]
    pub async fn submit(&self) -> Result<SubmissionState, SubmissionError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == SubmissionState::Idle {
                *state = SubmissionState::Submitting;
                true
            } else {
                false
            }
        });
        if !claimed {
            let current = self.state();
            debug!(state = ?current, "submission not idle, skipping");
            return Ok(current);
        }

        match self.send().await {
            Ok(()) => Ok(SubmissionState::Success),
            Err(err) => {
                warn!(error = %err, reauth = err.requires_reauth(), "score submission failed");
                self.state.send_replace(SubmissionState::Error);
                Err(err)
            }
        }
    }

    /// Reset a failed submission and submit again.
    ///
    /// A no-op unless the state is `Error`.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` when the new attempt fails.
    pub async fn retry(&self) -> Result<SubmissionState, SubmissionError> {
        let reset = self.state.send_if_modified(|state| {
            if *state == SubmissionState::Error {
                *state = SubmissionState::Idle;
                true
            } else {
                false
            }
        });
        if !reset {
            return Ok(self.state());
        }
        self.submit().await
    }

    async fn send(&self) -> Result<(), SubmissionError> {
        let token = self
            .kv
            .get_string(keys::AUTH_TOKEN)
            .await?
            .filter(|token| !token.trim().is_empty())
            .ok_or(SubmissionError::MissingToken)?;

        let topic = self.result.topic_key();
        self.gateway
            .submit_score(&token, topic.remote_name(), self.result.score_percent())
            .await?;
        self.state.send_replace(SubmissionState::Success);
        info!("score submitted");

        if let Err(err) = self.raise_cached_high_score().await {
            warn!(error = %err, "submitted score not written to local cache");
        }
        Ok(())
    }

    async fn raise_cached_high_score(&self) -> Result<(), SubmissionError> {
        let topic = self.result.topic_key();
        let score = self.result.score_percent();
        let at = self.clock.now();
        let written = self
            .cache
            .update(at, |stats| {
                match stats.iter_mut().find(|stat| stat.topic_key == topic) {
                    Some(stat) if score > stat.highest_score.unwrap_or(0) => {
                        stat.highest_score = Some(score);
                        true
                    }
                    _ => false,
                }
            })
            .await?;

        match written {
            Some(stats) => {
                debug!("cached high score raised");
                self.stats.apply_local_update(stats, at);
            }
            None => debug!("cached high score kept"),
        }
        Ok(())
    }
}
