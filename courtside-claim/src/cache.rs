//! Query cache for league API reads
//!
//! Each query is fetched lazily and shared by all readers. Concurrent reads
//! of the same query wait on a single in-flight fetch. `invalidate` marks a
//! query stale so the next read re-fetches; a fetch that was already in
//! flight when the invalidation happened is not treated as fresh.

use courtside_common::api::{AccountInfo, CurrentUser, MigrationRecord, Player};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClaimResult;

/// Cached server reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUser,
    Migrations,
    AccountInfo,
    ChildPlayers,
}

impl QueryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::CurrentUser => "current-user",
            QueryKey::Migrations => "migrations",
            QueryKey::AccountInfo => "account-info",
            QueryKey::ChildPlayers => "child-players",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Cached<T> {
    value: T,
    generation: u64,
}

/// One cached query
pub struct QueryCell<T> {
    key: QueryKey,
    generation: AtomicU64,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Clone> QueryCell<T> {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            generation: AtomicU64::new(0),
            slot: Mutex::new(None),
        }
    }

    /// Return the fresh cached value or run `fetch` to obtain one
    ///
    /// The slot lock is held across the fetch, which is what makes
    /// concurrent readers share a single request. Errors are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> ClaimResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClaimResult<T>>,
    {
        let mut slot = self.slot.lock().await;
        let generation = self.generation.load(Ordering::Acquire);

        if let Some(cached) = slot.as_ref() {
            if cached.generation == generation {
                return Ok(cached.value.clone());
            }
        }

        debug!(query = %self.key, generation, "Fetching query");
        let value = fetch().await?;
        *slot = Some(Cached {
            value: value.clone(),
            generation,
        });
        Ok(value)
    }

    /// Mark stale; the next read re-fetches
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Fresh cached value, if any, without fetching
    pub async fn peek(&self) -> Option<T> {
        let slot = self.slot.lock().await;
        let generation = self.generation.load(Ordering::Acquire);
        slot.as_ref()
            .filter(|cached| cached.generation == generation)
            .map(|cached| cached.value.clone())
    }
}

/// All queries read by the claim workflow
pub struct QueryCache {
    pub current_user: QueryCell<CurrentUser>,
    pub migrations: QueryCell<Vec<MigrationRecord>>,
    pub account_info: QueryCell<AccountInfo>,
    pub child_players: QueryCell<Vec<Player>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            current_user: QueryCell::new(QueryKey::CurrentUser),
            migrations: QueryCell::new(QueryKey::Migrations),
            account_info: QueryCell::new(QueryKey::AccountInfo),
            child_players: QueryCell::new(QueryKey::ChildPlayers),
        }
    }

    pub fn invalidate(&self, keys: &[QueryKey]) {
        for key in keys {
            match key {
                QueryKey::CurrentUser => self.current_user.invalidate(),
                QueryKey::Migrations => self.migrations.invalidate(),
                QueryKey::AccountInfo => self.account_info.invalidate(),
                QueryKey::ChildPlayers => self.child_players.invalidate(),
            }
        }
        debug!(queries = ?keys, "Invalidated queries");
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_read_is_cached() {
        let cell: QueryCell<u32> = QueryCell::new(QueryKey::Migrations);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cell
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cell: QueryCell<usize> = QueryCell::new(QueryKey::ChildPlayers);
        let calls = AtomicUsize::new(0);
        let fetch = || async { Ok::<_, ClaimError>(calls.fetch_add(1, Ordering::SeqCst) + 1) };

        assert_eq!(cell.get_or_fetch(fetch).await.unwrap(), 1);
        cell.invalidate();
        assert!(cell.peek().await.is_none());
        assert_eq!(cell.get_or_fetch(fetch).await.unwrap(), 2);
        assert_eq!(cell.peek().await, Some(2));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cell: QueryCell<u32> = QueryCell::new(QueryKey::AccountInfo);

        let result = cell
            .get_or_fetch(|| async { Err(ClaimError::Network("down".to_string())) })
            .await;
        assert!(result.is_err());

        let value = cell.get_or_fetch(|| async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cell: Arc<QueryCell<u32>> = Arc::new(QueryCell::new(QueryKey::Migrations));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cell = Arc::clone(&cell);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cell.get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(11)
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 11);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_leaves_value_stale() {
        let cell: Arc<QueryCell<u32>> = Arc::new(QueryCell::new(QueryKey::Migrations));

        let reader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.get_or_fetch(|| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(1)
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cell.invalidate();
        assert_eq!(reader.await.unwrap().unwrap(), 1);

        // fetched before the invalidation, so not fresh
        assert!(cell.peek().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidates_selected_keys() {
        let cache = QueryCache::new();
        cache
            .account_info
            .get_or_fetch(|| async { Ok(Default::default()) })
            .await
            .unwrap();
        cache
            .child_players
            .get_or_fetch(|| async { Ok(Vec::new()) })
            .await
            .unwrap();

        cache.invalidate(&[QueryKey::ChildPlayers]);

        assert!(cache.account_info.peek().await.is_some());
        assert!(cache.child_players.peek().await.is_none());
    }
}
