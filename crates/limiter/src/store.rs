//! The counter-store seam and the in-memory implementation.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// A shareable counter store.
pub type StoreHandle = Arc<dyn CounterStore>;

/// One observed hit: the post-increment count and how long until the
/// window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub count: u64,
    pub resets_in: Duration,
}

/// A shared key/value store of fixed-window counters.
///
/// `increment` is atomic: concurrent hits on one key from any process
/// sharing the store each observe a distinct count. A key created by an
/// increment expires `window` later; subsequent hits within the window do
/// not extend it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit>;
}

/// Counter store in process memory.
///
/// Fine for tests and single-process deployments; multi-process
/// deployments want [`SqliteStore`](crate::SqliteStore) or an external
/// equivalent, since each process would otherwise count alone.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (u64, OffsetDateTime)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit> {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert((0, now + window));
        if entry.1 <= now {
            *entry = (0, now + window);
        }
        entry.0 += 1;
        let resets_in = (entry.1 - now).try_into().unwrap_or(Duration::ZERO);
        Ok(Hit { count: entry.0, resets_in })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_increment_counts_within_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(3600);
        assert_eq!(store.increment("k", window).await.unwrap().count, 1);
        assert_eq!(store.increment("k", window).await.unwrap().count, 2);
        assert_eq!(store.increment("other", window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_expired_window_restarts_count() {
        let store = MemoryStore::new();
        // A zero-length window is already expired by the next hit.
        assert_eq!(store.increment("k", Duration::ZERO).await.unwrap().count, 1);
        assert_eq!(store.increment("k", Duration::ZERO).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_resets_in_is_bounded_by_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        let hit = store.increment("k", window).await.unwrap();
        assert!(hit.resets_in <= window);
        assert!(hit.resets_in > Duration::ZERO);
    }
}
