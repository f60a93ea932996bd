use std::sync::Arc;

use assess_core::model::{TopicKey, default_catalog};
use assess_core::time::fixed_now;
use storage::repository::{KeyValueStore, Storage, keys};
use storage::sqlite::SqliteRepository;
use storage::stats_cache::StatsCacheStore;

#[tokio::test]
async fn sqlite_round_trips_typed_values() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get_string("missing").await.unwrap(), None);
    assert_eq!(repo.get_long("missing").await.unwrap(), None);

    repo.set_string(keys::AUTH_TOKEN, "token-1").await.unwrap();
    repo.set_string(keys::AUTH_TOKEN, "token-2").await.unwrap();
    assert_eq!(
        repo.get_string(keys::AUTH_TOKEN).await.unwrap().as_deref(),
        Some("token-2")
    );

    repo.set_long(keys::TOPIC_STATS_UPDATED_AT, 1_700_000_000_000)
        .await
        .unwrap();
    assert_eq!(
        repo.get_long(keys::TOPIC_STATS_UPDATED_AT).await.unwrap(),
        Some(1_700_000_000_000)
    );

    repo.remove(keys::AUTH_TOKEN).await.unwrap();
    assert_eq!(repo.get_string(keys::AUTH_TOKEN).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.set_long("counter", 3).await.unwrap();
    repo.migrate().await.expect("second migrate");
    assert_eq!(repo.get_long("counter").await.unwrap(), Some(3));
}

#[tokio::test]
async fn stats_cache_survives_a_new_connection() {
    let url = "sqlite:file:memdb_kv_reopen?mode=memory&cache=shared";
    let first = Storage::sqlite(url).await.expect("first open");
    let cache = StatsCacheStore::new(Arc::clone(&first.kv));

    let mut stats = default_catalog();
    stats[2].highest_score = Some(64);
    cache.write(&stats, fixed_now()).await.unwrap();

    // A second pool over the same shared database sees the committed record.
    let second = Storage::sqlite(url).await.expect("second open");
    let reopened = StatsCacheStore::new(Arc::clone(&second.kv));
    let record = reopened.read().await.unwrap().expect("record present");
    assert_eq!(record.updated_at, Some(fixed_now()));
    let tri = record
        .stats
        .iter()
        .find(|s| s.topic_key == TopicKey::Triphthongs)
        .unwrap();
    assert_eq!(tri.highest_score, Some(64));
}

#[tokio::test]
async fn sqlite_paired_write_lands_in_one_transaction() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_pair?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(
        repo.get_string_and_long(keys::TOPIC_STATS, keys::TOPIC_STATS_UPDATED_AT)
            .await
            .unwrap(),
        (None, None)
    );

    repo.set_string_and_long(keys::TOPIC_STATS, "[]", keys::TOPIC_STATS_UPDATED_AT, 7)
        .await
        .unwrap();
    repo.set_string_and_long(keys::TOPIC_STATS, "[1]", keys::TOPIC_STATS_UPDATED_AT, 8)
        .await
        .unwrap();
    assert_eq!(
        repo.get_string_and_long(keys::TOPIC_STATS, keys::TOPIC_STATS_UPDATED_AT)
            .await
            .unwrap(),
        (Some("[1]".to_owned()), Some(8))
    );
    assert_eq!(repo.get_long(keys::TOPIC_STATS_UPDATED_AT).await.unwrap(), Some(8));
}
