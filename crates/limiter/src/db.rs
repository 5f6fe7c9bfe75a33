//! SQLite-backed counter store.

use crate::error::{ErrorKind, Result};
use crate::store::{CounterStore, Hit};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Counter traffic is one tiny transaction per request; a handful of
// connections is plenty.
const MAX_CONNECTIONS: u32 = 5;

/// Fixed-window counters in a SQLite database shared by every gateway
/// process on the host.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open (creating if missing) the store at the given path.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, None).await
    }

    /// An in-memory store (useful for testing).
    ///
    /// Limited to one connection; parallel in-memory connections would each
    /// see their own empty database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(options, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL keeps concurrent increments from serialising on fsync
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Increments from several processes can collide; wait briefly
            // instead of surfacing SQLITE_BUSY as a 503.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CounterStore for SqliteStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let expires = now + window.as_secs() as i64;

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        // Reap a leftover expired window for this key so the insert below
        // starts a fresh one.
        sqlx::query("DELETE FROM rate_windows WHERE key = ?1 AND expires_at <= ?2")
            .bind(key)
            .bind(now)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (count, expires_at): (i64, i64) = sqlx::query_as(
            "INSERT INTO rate_windows (key, count, expires_at) VALUES (?1, 1, ?2) \
             ON CONFLICT (key) DO UPDATE SET count = count + 1 \
             RETURNING count, expires_at",
        )
        .bind(key)
        .bind(expires)
        .fetch_one(&mut *tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        let resets_in = Duration::from_secs(expires_at.saturating_sub(now).max(0) as u64);
        Ok(Hit { count: count.max(0) as u64, resets_in })
    }
}
