use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use sqlx::SqlitePool;

use crate::config::MAX_READINESS_TTL_SECS;
use crate::error::{AppError, Result};

#[derive(Debug)]
pub struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// A tiny string key/value store where every key carries a time-to-live.
/// Expired keys read as absent.
#[derive(Debug, Clone)]
pub enum KvStore {
    /// `kv_store` table in the harvester database; other processes can read it.
    Sqlite(SqlitePool),
    Memory(Arc<DashMap<String, MemoryEntry>>),
}

impl KvStore {
    pub fn sqlite(pool: SqlitePool) -> Self {
        KvStore::Sqlite(pool)
    }

    pub fn memory() -> Self {
        KvStore::Memory(Arc::new(DashMap::new()))
    }

    /// Set `key` to `value`, replacing any previous value and expiry.
    /// Expiries beyond `MAX_READINESS_TTL_SECS` are shortened to it.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = ttl.min(Duration::from_secs(MAX_READINESS_TTL_SECS));
        match self {
            KvStore::Sqlite(pool) => {
                let expires_at = Utc::now().timestamp().saturating_add(ttl.as_secs() as i64);
                sqlx::query(
                    r#"
                    INSERT INTO kv_store (key, value, expires_at) VALUES (?, ?, ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(expires_at)
                .execute(pool)
                .await
                .map_err(|e| AppError::Readiness(format!("set {key}: {e}")))?;
            }
            KvStore::Memory(map) => {
                map.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: value.to_string(),
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            KvStore::Sqlite(pool) => {
                let value: Option<String> = sqlx::query_scalar(
                    "SELECT value FROM kv_store WHERE key = ? AND expires_at > ?",
                )
                .bind(key)
                .bind(Utc::now().timestamp())
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Readiness(format!("get {key}: {e}")))?;
                Ok(value)
            }
            KvStore::Memory(map) => {
                let now = Instant::now();
                let hit = map
                    .get(key)
                    .filter(|entry| entry.expires_at > now)
                    .map(|entry| entry.value.clone());
                if hit.is_none() {
                    map.remove_if(key, |_, entry| entry.expires_at <= now);
                }
                Ok(hit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open;

    #[tokio::test]
    async fn memory_store_honours_ttl() {
        let store = KvStore::memory();
        store.set_ex("k", "1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));

        store.set_ex("k", "0", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_store_overwrites_and_expires() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("kv.db").to_string_lossy()).await.unwrap();
        let store = KvStore::sqlite(pool);

        store.set_ex("k", "0", Duration::from_secs(60)).await.unwrap();
        store.set_ex("k", "1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));

        store.set_ex("k", "1", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped_on_both_backends() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("kv.db").to_string_lossy()).await.unwrap();

        for store in [KvStore::memory(), KvStore::sqlite(pool)] {
            store.set_ex("k", "1", Duration::MAX).await.unwrap();
            assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
        }
    }
}
