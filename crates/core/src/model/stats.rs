use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::topic::{TopicKey, TopicStat, default_catalog, normalize_title};

/// Freshness window for cached stats, in seconds.
pub const STALE_AFTER_SECS: i64 = 5 * 60;

/// Default freshness window for cached stats.
#[must_use]
pub fn default_stale_after() -> Duration {
    Duration::seconds(STALE_AFTER_SECS)
}

/// Returns true when a cache written at `last_updated_at` should be refreshed.
///
/// A record exactly `window` old is still fresh. A record that was never
/// written is always stale.
#[must_use]
pub fn is_stale(last_updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match last_updated_at {
        Some(at) => now - at > window,
        None => true,
    }
}

//
// ─── SYNC STATUS ───────────────────────────────────────────────────────────────
//

/// Where the published stats came from and what the synchronizer is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing has been loaded yet.
    Loading,
    /// Showing a stale cache record.
    Cached,
    /// A refresh is in flight over previously shown data.
    Updating,
    /// Showing data that is fresh or was just fetched.
    Updated,
    /// The last refresh failed.
    Error { message: String },
    /// No network transport was available for the last refresh.
    Offline,
}

impl SyncStatus {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error { .. })
    }
}

/// The single published view of topic stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub data: Vec<TopicStat>,
    pub status: SyncStatus,
    /// `None` until the cache has been written at least once.
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    /// Snapshot published before anything is read.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            data: Vec::new(),
            status: SyncStatus::Loading,
            last_updated_at: None,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            SyncStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Published data, or the default catalog when nothing was ever loaded.
    #[must_use]
    pub fn data_or_catalog(&self) -> Vec<TopicStat> {
        if self.data.is_empty() {
            default_catalog()
        } else {
            self.data.clone()
        }
    }

    #[must_use]
    pub fn topic(&self, key: TopicKey) -> Option<&TopicStat> {
        self.data.iter().find(|stat| stat.topic_key == key)
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

//
// ─── MERGE ─────────────────────────────────────────────────────────────────────
//

/// A stats record as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTopicStat {
    pub topic_title: String,
    #[serde(default)]
    pub highest_score: Option<u32>,
    #[serde(default)]
    pub accuracy: Option<u32>,
}

impl RemoteTopicStat {
    #[must_use]
    pub fn new(topic_title: impl Into<String>, highest_score: Option<u32>, accuracy: Option<u32>) -> Self {
        Self {
            topic_title: topic_title.into(),
            highest_score,
            accuracy,
        }
    }
}

/// Merge remote records into `base`, keyed by normalized title.
///
/// Output order and membership always equal the default catalog. For each
/// catalog topic the starting value is the matching entry of `base` (or an
/// empty entry), and a remote record whose normalized title equals the
/// topic's normalized catalog title overwrites `highest_score` and
/// `accuracy`. Remote records matching no topic are dropped. When the remote
/// list repeats a title the last record wins.
#[must_use]
pub fn merge_remote(base: &[TopicStat], remote: &[RemoteTopicStat]) -> Vec<TopicStat> {
    let lookup: HashMap<String, &RemoteTopicStat> = remote
        .iter()
        .map(|record| (normalize_title(&record.topic_title), record))
        .collect();

    TopicKey::ALL
        .into_iter()
        .map(|key| {
            let mut stat = base
                .iter()
                .find(|stat| stat.topic_key == key)
                .cloned()
                .unwrap_or_else(|| TopicStat::empty(key));
            stat.title = key.title().to_owned();
            match lookup.get(&normalize_title(key.title())) {
                Some(record) => stat.with_scores(record.highest_score, record.accuracy),
                None => stat,
            }
        })
        .collect()
}

/// Re-shape any stats list into catalog order and membership.
#[must_use]
pub fn align_to_catalog(stats: &[TopicStat]) -> Vec<TopicStat> {
    merge_remote(stats, &[])
}
