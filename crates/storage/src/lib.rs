#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
pub mod stats_cache;

pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
pub use stats_cache::{CacheRecord, StatsCacheStore};
