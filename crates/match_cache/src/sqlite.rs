//! SQLite backing store (WAL). Connection žije za std Mutexem,
//! každá operace běží v `spawn_blocking`, aby neblokovala runtime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::{CacheError, Result};
use crate::store::{CacheEntry, CacheStore};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            expires_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at_ms);
        "#,
    )?;
    Ok(())
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        init_schema(&conn)?;

        info!("cache store opened at {}", path.display());
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Pro testy a `memory` mód bez souboru.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| CacheError::Poisoned)?;
            op(&guard)
        })
        .await?
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| CacheError::Unavailable(format!("bad expiry timestamp {ms}")))
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT value_json, expires_at_ms FROM cache_entries WHERE key = ?1",
                    params![key],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;

            match row {
                Some((raw, ms)) => Ok(Some(CacheEntry {
                    key,
                    value: serde_json::from_str(&raw)?,
                    expires_at: from_millis(ms)?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let raw = serde_json::to_string(&entry.value)?;
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT INTO cache_entries(key, value_json, expires_at_ms) VALUES(?1, ?2, ?3)
                   ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, expires_at_ms = excluded.expires_at_ms"#,
                params![entry.key, raw, entry.expires_at.timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| Ok(conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])? > 0))
            .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now.timestamp_millis();
        self.with_conn(move |conn| Ok(conn.execute("DELETE FROM cache_entries WHERE expires_at_ms <= ?1", params![cutoff])?))
            .await
    }
}
