//! Typed access to the cached topic stats.
//!
//! The cache is two keys: the serialized stats list and the epoch-millis
//! timestamp of its last write. Both are written in one atomic store call,
//! under a process-wide lock, and read back in one call, so readers never see
//! a timestamp that does not belong to the blob and concurrent
//! read-modify-write cycles cannot lose updates.

use std::sync::Arc;

use assess_core::model::{TopicStat, align_to_catalog};
use assess_core::time::{from_epoch_millis, to_epoch_millis};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::repository::{KeyValueStore, StorageError, keys};

/// A stats list as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub stats: Vec<TopicStat>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Single-writer wrapper over the stats cache keys.
#[derive(Clone)]
pub struct StatsCacheStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl StatsCacheStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the cached record.
    ///
    /// Returns `Ok(None)` when no stats were ever written. The list is
    /// re-shaped into catalog order, so entries for unknown or missing topics
    /// never leak out of the cache.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the blob cannot be decoded.
    pub async fn read(&self) -> Result<Option<CacheRecord>, StorageError> {
        let (blob, millis) = self
            .kv
            .get_string_and_long(keys::TOPIC_STATS, keys::TOPIC_STATS_UPDATED_AT)
            .await?;
        let Some(blob) = blob else {
            return Ok(None);
        };
        let stats: Vec<TopicStat> = serde_json::from_str(&blob)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(CacheRecord {
            stats: align_to_catalog(&stats),
            updated_at: millis.and_then(from_epoch_millis),
        }))
    }

    /// Timestamp of the last write, without decoding the blob.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let millis = self.kv.get_long(keys::TOPIC_STATS_UPDATED_AT).await?;
        Ok(millis.and_then(from_epoch_millis))
    }

    /// Replace the cached list and stamp it with `at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either key cannot be written.
    pub async fn write(&self, stats: &[TopicStat], at: DateTime<Utc>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.write_unlocked(stats, at).await
    }

    /// Read-modify-write the cached list under the write lock.
    ///
    /// `apply` receives the current list and returns whether it changed it.
    /// Nothing is written when there is no cached list or `apply` reports no
    /// change. Returns the list that was written, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read, decoded or written.
    pub async fn update<F>(&self, at: DateTime<Utc>, apply: F) -> Result<Option<Vec<TopicStat>>, StorageError>
    where
        F: FnOnce(&mut Vec<TopicStat>) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut record) = self.read().await? else {
            debug!("no cached stats to update");
            return Ok(None);
        };
        if !apply(&mut record.stats) {
            return Ok(None);
        }
        self.write_unlocked(&record.stats, at).await?;
        Ok(Some(record.stats))
    }

    /// Rebuild the cached list from its current contents under the write lock.
    ///
    /// `build` receives the cached list, or `None` when there is none or it
    /// cannot be decoded, and returns the list to store. Returns the list
    /// that was written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read or written.
    pub async fn replace_with<F>(&self, at: DateTime<Utc>, build: F) -> Result<Vec<TopicStat>, StorageError>
    where
        F: FnOnce(Option<Vec<TopicStat>>) -> Vec<TopicStat> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let current = match self.read().await {
            Ok(record) => record.map(|record| record.stats),
            Err(StorageError::Serialization(err)) => {
                warn!(error = %err, "replacing undecodable stats cache");
                None
            }
            Err(err) => return Err(err),
        };
        let stats = build(current);
        self.write_unlocked(&stats, at).await?;
        Ok(stats)
    }

    /// Drop the cached list and its timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.kv.remove(keys::TOPIC_STATS).await?;
        self.kv.remove(keys::TOPIC_STATS_UPDATED_AT).await
    }

    async fn write_unlocked(&self, stats: &[TopicStat], at: DateTime<Utc>) -> Result<(), StorageError> {
        let blob = serde_json::to_string(stats)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv
            .set_string_and_long(
                keys::TOPIC_STATS,
                &blob,
                keys::TOPIC_STATS_UPDATED_AT,
                to_epoch_millis(at),
            )
            .await?;
        debug!(topics = stats.len(), "stats cache written");
        Ok(())
    }
}
