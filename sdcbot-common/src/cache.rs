//! Skip-mark persistence
//!
//! Records that finished with nothing left to add, and platform lookups
//! that failed permanently, are marked so later runs skip them without
//! repeating API calls. Marks carry no payload, only the fact that the
//! key was settled.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;

/// Cache key for a knowledge-base record.
pub fn record_key(prefix: &str, mid: &str) -> String {
    format!("{}:commons:{}", prefix, mid)
}

/// Cache key for a platform-side object that could not be fetched.
pub fn photo_key(prefix: &str, photo_id: &str) -> String {
    format!("{}:{}:photo", prefix, photo_id)
}

/// Store of settled keys.
#[async_trait]
pub trait SkipCache: Send + Sync {
    async fn is_marked(&self, key: &str) -> Result<bool>;
    async fn mark(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<C: SkipCache + ?Sized> SkipCache for std::sync::Arc<C> {
    async fn is_marked(&self, key: &str) -> Result<bool> {
        (**self).is_marked(key).await
    }

    async fn mark(&self, key: &str) -> Result<()> {
        (**self).mark(key).await
    }
}

// ============================================================================
// SQLite backend
// ============================================================================

/// Skip marks persisted in a SQLite database shared by all runs.
pub struct SqliteSkipCache {
    pool: SqlitePool,
}

impl SqliteSkipCache {
    /// Open (creating if needed) the skip-mark database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        // WAL allows a concurrent reader while another run writes
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        let cache = SqliteSkipCache { pool };
        cache.create_table().await?;

        info!("Opened skip-mark database: {}", path.display());
        Ok(cache)
    }

    /// In-memory database, for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect(":memory:").await?;
        let cache = SqliteSkipCache { pool };
        cache.create_table().await?;
        Ok(cache)
    }

    async fn create_table(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS skip_marks (
                key TEXT PRIMARY KEY,
                marked_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SkipCache for SqliteSkipCache {
    async fn is_marked(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM skip_marks WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn mark(&self, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO skip_marks (key, marked_at) VALUES (?, ?)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key, "Marked as settled");
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Non-persistent skip cache, for tests and one-shot runs.
#[derive(Default)]
pub struct MemorySkipCache {
    keys: Mutex<HashSet<String>>,
}

impl MemorySkipCache {
    pub fn new() -> Self {
        MemorySkipCache::default()
    }
}

#[async_trait]
impl SkipCache for MemorySkipCache {
    async fn is_marked(&self, key: &str) -> Result<bool> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| crate::error::Error::Internal("skip cache lock poisoned".into()))?;
        Ok(keys.contains(key))
    }

    async fn mark(&self, key: &str) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| crate::error::Error::Internal("skip cache lock poisoned".into()))?;
        keys.insert(key.to_string());
        Ok(())
    }
}

// ============================================================================
// Dry-run decorator
// ============================================================================

/// Wraps another cache for dry runs: reads pass through so already-settled
/// records are still skipped, writes are logged and discarded.
pub struct DryRunCache<C> {
    inner: C,
}

impl<C: SkipCache> DryRunCache<C> {
    pub fn new(inner: C) -> Self {
        DryRunCache { inner }
    }
}

#[async_trait]
impl<C: SkipCache> SkipCache for DryRunCache<C> {
    async fn is_marked(&self, key: &str) -> Result<bool> {
        self.inner.is_marked(key).await
    }

    async fn mark(&self, key: &str) -> Result<()> {
        info!(key, "Dry run, not marking");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
