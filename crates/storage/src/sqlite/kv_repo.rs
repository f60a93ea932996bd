use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{KeyValueStore, StorageError};

const UPSERT_TEXT: &str = r"
    INSERT INTO kv_store (key, text_value, int_value, updated_at)
    VALUES (?1, ?2, NULL, ?3)
    ON CONFLICT(key) DO UPDATE SET
        text_value = excluded.text_value,
        int_value = NULL,
        updated_at = excluded.updated_at
";

const UPSERT_INT: &str = r"
    INSERT INTO kv_store (key, text_value, int_value, updated_at)
    VALUES (?1, NULL, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        text_value = NULL,
        int_value = excluded.int_value,
        updated_at = excluded.updated_at
";

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteRepository {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT text_value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        row.try_get::<Option<String>, _>("text_value").map_err(ser)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(UPSERT_TEXT)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query("SELECT int_value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        row.try_get::<Option<i64>, _>("int_value").map_err(ser)
    }

    async fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError> {
        sqlx::query(UPSERT_INT)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_string_and_long(
        &self,
        string_key: &str,
        long_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError> {
        // One statement, so both values come from the same committed state.
        let rows = sqlx::query(
            "SELECT key, text_value, int_value FROM kv_store WHERE key IN (?1, ?2)",
        )
        .bind(string_key)
        .bind(long_key)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut text = None;
        let mut int = None;
        for row in rows {
            let key: String = row.try_get("key").map_err(ser)?;
            if key == string_key {
                text = row.try_get::<Option<String>, _>("text_value").map_err(ser)?;
            }
            if key == long_key {
                int = row.try_get::<Option<i64>, _>("int_value").map_err(ser)?;
            }
        }
        Ok((text, int))
    }

    async fn set_string_and_long(
        &self,
        string_key: &str,
        string_value: &str,
        long_key: &str,
        long_value: i64,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(UPSERT_TEXT)
            .bind(string_key)
            .bind(string_value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(UPSERT_INT)
            .bind(long_key)
            .bind(long_value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
