//! `SQLite` persistence for storage areas.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::Store;
use crate::Result;

/// `SQLite`-backed [`Store`].
///
/// Several areas may share one database file; every row is scoped by the
/// area name given at construction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    area: String,
}

impl SqliteStore {
    /// Create a new store with the given database path and area name.
    ///
    /// Creates the database and table if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str, area: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self {
            pool,
            area: area.to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(area: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            area: area.to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Another area in the same database.
    #[must_use]
    pub fn area(&self, area: &str) -> Self {
        Self {
            pool: self.pool.clone(),
            area: area.to_string(),
        }
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS storage_entries (
                area TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (area, key)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert(
        &self,
        executor: &mut sqlx::SqliteConnection,
        key: &str,
        value: &Value,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO storage_entries (area, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(area, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&self.area)
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(Utc::now().to_rfc3339())
        .execute(executor)
        .await?;

        Ok(())
    }
}

impl Store for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query(r"SELECT value FROM storage_entries WHERE area = ? AND key = ?")
            .bind(&self.area)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let rows = sqlx::query(r"SELECT key, value FROM storage_entries WHERE area = ?")
            .bind(&self.area)
            .fetch_all(&self.pool)
            .await?;

        let entries = rows
            .iter()
            .filter_map(|row| {
                let key: String = row.get("key");
                if !keys.contains(&key.as_str()) {
                    return None;
                }
                let raw: String = row.get("value");
                match serde_json::from_str(&raw) {
                    Ok(value) => Some((key, value)),
                    Err(e) => {
                        warn!(area = %self.area, key, "Skipping unreadable stored value: {e}");
                        None
                    }
                }
            })
            .collect();

        Ok(entries)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(r"SELECT key FROM storage_entries WHERE area = ? ORDER BY key")
            .bind(&self.area)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("key")).collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.upsert(&mut conn, key, &value).await
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in &entries {
            self.upsert(&mut tx, key, value).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query(r"DELETE FROM storage_entries WHERE area = ? AND key = ?")
                .bind(&self.area)
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query(r"DELETE FROM storage_entries WHERE area = ?")
            .bind(&self.area)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = SqliteStore::in_memory("local").await.unwrap();

        store.set("allTimeHiddenPosts", json!(42)).await.unwrap();
        assert_eq!(
            store.get("allTimeHiddenPosts").await.unwrap(),
            Some(json!(42))
        );

        store.set("allTimeHiddenPosts", json!(43)).await.unwrap();
        assert_eq!(
            store.get("allTimeHiddenPosts").await.unwrap(),
            Some(json!(43))
        );
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_many_and_get_many() {
        let store = SqliteStore::in_memory("local").await.unwrap();

        store
            .set_many(vec![
                ("blacklistFullDataByLevel".into(), json!({"Level 1": ["abc"]})),
                ("blacklistTimestamp".into(), json!(1_700_000_000_000_i64)),
                ("blacklistEtag".into(), json!("\"v1\"")),
            ])
            .await
            .unwrap();

        let entries = store
            .get_many(&["blacklistFullDataByLevel", "blacklistEtag", "missing"])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["blacklistEtag"], json!("\"v1\""));
        assert_eq!(
            entries["blacklistFullDataByLevel"],
            json!({"Level 1": ["abc"]})
        );
    }

    #[tokio::test]
    async fn test_areas_are_isolated() {
        let local = SqliteStore::in_memory("local").await.unwrap();
        let sync = local.area("sync");

        local.set("blockingLevel", json!("low")).await.unwrap();
        sync.set("blockingLevel", json!("high")).await.unwrap();

        assert_eq!(local.get("blockingLevel").await.unwrap(), Some(json!("low")));
        assert_eq!(sync.get("blockingLevel").await.unwrap(), Some(json!("high")));
        assert_eq!(sync.keys().await.unwrap(), vec!["blockingLevel".to_string()]);

        sync.clear().await.unwrap();
        assert_eq!(sync.get("blockingLevel").await.unwrap(), None);
        assert_eq!(local.get("blockingLevel").await.unwrap(), Some(json!("low")));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::in_memory("local").await.unwrap();
        store.set("blacklistEtag", json!("x")).await.unwrap();
        store
            .remove(&["blacklistEtag", "blacklistLastModified"])
            .await
            .unwrap();
        assert_eq!(store.get("blacklistEtag").await.unwrap(), None);
    }
}
