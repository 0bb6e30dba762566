//! Cache storage for the worker.
//!
//! SQLite holds every cached response, keyed by (cache name, url). Cache
//! names are versioned; activation deletes every row whose cache name is not
//! one of the two current names.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::errors::AppError;

/// Initialize the cache database and run migrations.
pub async fn init_cache_db(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            cache_name TEXT NOT NULL,
            url TEXT NOT NULL,
            status INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            body BLOB NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (cache_name, url)
        );

        CREATE INDEX IF NOT EXISTS idx_cache_entries_name ON cache_entries(cache_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// A response stored in a cache bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Cache storage for all worker cache buckets.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a cached response.
    pub async fn get(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>, AppError> {
        let row = sqlx::query(
            "SELECT status, content_type, body, stored_at FROM cache_entries WHERE cache_name = ? AND url = ?",
        )
        .bind(cache_name)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CachedResponse {
            status: row.get::<i64, _>("status") as u16,
            content_type: row.get("content_type"),
            body: row.get("body"),
            stored_at: row.get("stored_at"),
        }))
    }

    /// Store a response, replacing any previous entry for the same url.
    pub async fn put(
        &self,
        cache_name: &str,
        url: &str,
        status: u16,
        content_type: &str,
        body: &[u8],
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries (cache_name, url, status, content_type, body, stored_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(cache_name)
        .bind(url)
        .bind(status as i64)
        .bind(content_type)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete every cache whose name is not one of the two given names.
    /// Returns the number of entries removed.
    pub async fn delete_except(
        &self,
        static_cache: &str,
        runtime_cache: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE cache_name NOT IN (?, ?)")
            .bind(static_cache)
            .bind(runtime_cache)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Distinct cache names currently present.
    pub async fn cache_names(&self) -> Result<Vec<String>, AppError> {
        let rows =
            sqlx::query("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|row| row.get("cache_name")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (CacheStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_cache_db(&dir.path().join("cache.sqlite")).await.unwrap();
        (CacheStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (store, _dir) = test_store().await;

        store
            .put("static-v1", "/app.js", 200, "text/javascript", b"console.log(1)")
            .await
            .unwrap();

        let hit = store.get("static-v1", "/app.js").await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type, "text/javascript");
        assert_eq!(hit.body, b"console.log(1)");

        assert!(store.get("static-v1", "/missing.js").await.unwrap().is_none());
        assert!(store.get("runtime-v1", "/app.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_entry() {
        let (store, _dir) = test_store().await;

        store.put("runtime-v1", "/api/x", 200, "application/json", b"{\"v\":1}").await.unwrap();
        store.put("runtime-v1", "/api/x", 200, "application/json", b"{\"v\":2}").await.unwrap();

        let hit = store.get("runtime-v1", "/api/x").await.unwrap().unwrap();
        assert_eq!(hit.body, b"{\"v\":2}");
    }

    #[tokio::test]
    async fn test_delete_except_removes_stale_caches() {
        let (store, _dir) = test_store().await;

        store.put("static-v1", "/a", 200, "text/html", b"old").await.unwrap();
        store.put("runtime-v1", "/api/a", 200, "application/json", b"old").await.unwrap();
        store.put("static-v2", "/a", 200, "text/html", b"new").await.unwrap();

        let removed = store.delete_except("static-v2", "runtime-v2").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.cache_names().await.unwrap(), vec!["static-v2"]);
    }
}
