use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Keys the app persists in the key-value store.
pub mod keys {
    /// Bearer token for the remote stats service.
    pub const AUTH_TOKEN: &str = "auth_token";
    /// JSON array of `TopicStat`.
    pub const TOPIC_STATS: &str = "topic_stats";
    /// Epoch millis of the last `TOPIC_STATS` write.
    pub const TOPIC_STATS_UPDATED_AT: &str = "topic_stats_updated_at";
}

/// Durable key-value contract.
///
/// Values are typed by accessor: a key written with `set_long` is read back
/// with `get_long`. Writing one type clears the other for the same key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a string value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read an integer value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError>;

    /// Write an integer value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError>;

    /// Read a string key and an integer key as one consistent pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_string_and_long(
        &self,
        string_key: &str,
        long_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError>;

    /// Write a string key and an integer key atomically: either both values
    /// are stored or neither is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pair cannot be stored.
    async fn set_string_and_long(
        &self,
        string_key: &str,
        string_value: &str,
        long_key: &str,
        long_value: i64,
    ) -> Result<(), StorageError>;

    /// Delete a key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory store implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<Entries>>,
}

#[derive(Default)]
struct Entries {
    strings: HashMap<String, String>,
    longs: HashMap<String, i64>,
}

impl Entries {
    fn put_string(&mut self, key: &str, value: &str) {
        self.longs.remove(key);
        self.strings.insert(key.to_owned(), value.to_owned());
    }

    fn put_long(&mut self, key: &str, value: i64) {
        self.strings.remove(key);
        self.longs.insert(key.to_owned(), value);
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, Entries>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.strings.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.put_string(key, value);
        Ok(())
    }

    async fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.entries()?.longs.get(key).copied())
    }

    async fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.entries()?.put_long(key, value);
        Ok(())
    }

    async fn get_string_and_long(
        &self,
        string_key: &str,
        long_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError> {
        let entries = self.entries()?;
        Ok((
            entries.strings.get(string_key).cloned(),
            entries.longs.get(long_key).copied(),
        ))
    }

    async fn set_string_and_long(
        &self,
        string_key: &str,
        string_value: &str,
        long_key: &str,
        long_value: i64,
    ) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.put_string(string_key, string_value);
        entries.put_long(long_key, long_value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.strings.remove(key);
        entries.longs.remove(key);
        Ok(())
    }
}

/// Holds the key-value backend behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryStore::new()),
        }
    }

    /// Read the auth token, if one was stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn auth_token(&self) -> Result<Option<String>, StorageError> {
        self.kv.get_string(keys::AUTH_TOKEN).await
    }

    /// Persist the auth token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be stored.
    pub async fn set_auth_token(&self, token: &str) -> Result<(), StorageError> {
        self.kv.set_string(keys::AUTH_TOKEN, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typed_values_replace_each_other() {
        let store = InMemoryStore::new();
        store.set_string("k", "text").await.unwrap();
        store.set_long("k", 7).await.unwrap();
        assert_eq!(store.get_string("k").await.unwrap(), None);
        assert_eq!(store.get_long("k").await.unwrap(), Some(7));

        store.set_string("k", "again").await.unwrap();
        assert_eq!(store.get_long("k").await.unwrap(), None);
        assert_eq!(store.get_string("k").await.unwrap().as_deref(), Some("again"));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = InMemoryStore::new();
        store.set_long("ts", 1).await.unwrap();
        store.remove("ts").await.unwrap();
        store.remove("ts").await.unwrap();
        assert_eq!(store.get_long("ts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn paired_write_is_read_back_together() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_string_and_long("blob", "ts").await.unwrap(), (None, None));

        store.set_string_and_long("blob", "[]", "ts", 42).await.unwrap();
        assert_eq!(
            store.get_string_and_long("blob", "ts").await.unwrap(),
            (Some("[]".to_owned()), Some(42))
        );
        assert_eq!(store.get_long("ts").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn storage_round_trips_auth_token() {
        let storage = Storage::in_memory();
        assert_eq!(storage.auth_token().await.unwrap(), None);
        storage.set_auth_token("secret").await.unwrap();
        assert_eq!(storage.auth_token().await.unwrap().as_deref(), Some("secret"));
    }
}
