//! TTL key-value cache in front of the leaderboard query service
//!
//! The trait is the contract the rest of the crate depends on; the moka
//! implementation is the in-process production backend. Implementations
//! must fail open: an unreachable backend behaves as a miss on `get` and a
//! no-op on `put`/`delete`, never an error.

use crate::leaderboard::{Timeframe, DEFAULT_LIMIT};
use async_trait::async_trait;
use moka::future::Cache;
use std::time::{Duration, Instant};

/// TTL for public leaderboard entries
pub const LEADERBOARD_TTL: Duration = Duration::from_secs(300);

/// Bumping this invalidates every previously written key
const CACHE_VERSION: u32 = 1;

/// Key-value cache with per-entry TTL
#[async_trait]
pub trait LeaderboardCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, body: String, ttl: Duration);
    async fn delete(&self, key: &str);
}

/// `leaderboard:v1:{category}:{timeframe}:{limit}`; no category → `all`
pub fn cache_key(category: Option<&str>, timeframe: Timeframe, limit: i64) -> String {
    format!(
        "leaderboard:v{CACHE_VERSION}:{}:{}:{limit}",
        category.unwrap_or("all"),
        timeframe.as_str()
    )
}

/// Keys deleted after a vote: the voted product's category plus the
/// unfiltered listing, across every timeframe, at the default page size.
/// Deliberately approximate — non-default limits ride out the TTL.
pub fn invalidation_keys(category: &str) -> Vec<String> {
    let mut keys = Vec::with_capacity(Timeframe::ALL.len() * 2);
    for cat in [Some(category), None] {
        for timeframe in Timeframe::ALL {
            keys.push(cache_key(cat, timeframe, DEFAULT_LIMIT));
        }
    }
    keys
}

#[derive(Clone)]
struct CachedEntry {
    body: String,
    ttl: Duration,
}

/// Honors the TTL supplied at `put` time
struct PutTtlExpiry;

impl moka::Expiry<String, CachedEntry> for PutTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by moka
#[derive(Clone)]
pub struct MokaCache {
    inner: Cache<String, CachedEntry>,
}

impl MokaCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PutTtlExpiry)
                .build(),
        }
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl LeaderboardCache for MokaCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.map(|entry| entry.body)
    }

    async fn put(&self, key: &str, body: String, ttl: Duration) {
        self.inner
            .insert(key.to_string(), CachedEntry { body, ttl })
            .await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_scheme() {
        assert_eq!(
            cache_key(Some("saas"), Timeframe::Week, 50),
            "leaderboard:v1:saas:week:50"
        );
        assert_eq!(
            cache_key(None, Timeframe::All, 20),
            "leaderboard:v1:all:all:20"
        );
    }

    #[test]
    fn test_invalidation_keys_cover_category_and_all() {
        let keys = invalidation_keys("saas");
        assert_eq!(keys.len(), 8);
        assert!(keys.contains(&"leaderboard:v1:saas:week:50".to_string()));
        assert!(keys.contains(&"leaderboard:v1:saas:all:50".to_string()));
        assert!(keys.contains(&"leaderboard:v1:all:month:50".to_string()));
        assert!(!keys.iter().any(|k| k.contains(":fintech:")));
    }

    #[tokio::test]
    async fn test_put_get_delete_roundtrip() {
        let cache = MokaCache::default();
        cache
            .put("k1", "body".into(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k1").await.as_deref(), Some("body"));

        cache.delete("k1").await;
        assert_eq!(cache.get("k1").await, None);
    }

    #[tokio::test]
    async fn test_entries_expire_after_put_ttl() {
        let cache = MokaCache::default();
        cache
            .put("short", "x".into(), Duration::from_millis(50))
            .await;
        cache.put("long", "y".into(), Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await.as_deref(), Some("y"));
    }
}
