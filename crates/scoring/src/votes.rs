//! Vote ingestion — validated, rate-limited, idempotent
//!
//! The write path never recomputes aggregates itself; the repository's
//! upsert-plus-recompute transaction owns that. Cache invalidation is
//! best effort: a failed delete degrades to serving a stale leaderboard
//! for up to one TTL window, never a user-visible error.

use crate::cache::{invalidation_keys, LeaderboardCache};
use crate::ScoringError;
use moka::future::Cache;
use persistence::repository::{ProductRepository, VoteRepository};
use persistence::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One vote per user per window
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(5);

/// Fixed-window limiter keyed by user id; entries expire with the window
pub struct RateLimiter {
    window: Duration,
    recent: Cache<i64, Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
        }
    }

    /// `Some(retry_after_secs)` while the caller is inside the window,
    /// `None` when the attempt is admitted (and the window restarted)
    pub async fn check(&self, user_id: i64) -> Option<u64> {
        if let Some(last) = self.recent.get(&user_id).await {
            let remaining = self.window.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                return Some(remaining.as_secs().max(1));
            }
        }
        self.recent.insert(user_id, Instant::now()).await;
        None
    }
}

/// Service wrapping the vote write path
pub struct VoteService {
    pool: SqlitePool,
    cache: Arc<dyn LeaderboardCache>,
    limiter: RateLimiter,
}

impl VoteService {
    pub fn new(pool: SqlitePool, cache: Arc<dyn LeaderboardCache>) -> Self {
        Self::with_window(pool, cache, RATE_LIMIT_WINDOW)
    }

    /// Injectable window for tests
    pub fn with_window(
        pool: SqlitePool,
        cache: Arc<dyn LeaderboardCache>,
        window: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            limiter: RateLimiter::new(window),
        }
    }

    /// Record (or overwrite) a user's vote on a product
    pub async fn record_vote(
        &self,
        product_id: i64,
        user_id: i64,
        rating: i64,
    ) -> Result<(), ScoringError> {
        if !(1..=5).contains(&rating) {
            return Err(ScoringError::InvalidRating(rating));
        }

        if let Some(retry_after_secs) = self.limiter.check(user_id).await {
            return Err(ScoringError::RateLimited { retry_after_secs });
        }

        let product = ProductRepository::new(&self.pool)
            .get(product_id)
            .await?
            .filter(|p| p.status == "active")
            .ok_or(ScoringError::ProductNotFound(product_id))?;

        VoteRepository::new(&self.pool)
            .record(product_id, user_id, rating)
            .await?;
        info!(product_id, user_id, rating, "vote recorded");

        self.invalidate(&product.category).await;
        Ok(())
    }

    /// The caller's existing vote, if any
    pub async fn get_vote(
        &self,
        product_id: i64,
        user_id: i64,
    ) -> Result<Option<i64>, ScoringError> {
        let vote = VoteRepository::new(&self.pool)
            .get(product_id, user_id)
            .await?;
        Ok(vote.map(|v| v.rating))
    }

    async fn invalidate(&self, category: &str) {
        for key in invalidation_keys(category) {
            self.cache.delete(&key).await;
        }
        debug!(category, "leaderboard cache keys invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{cache_key, MokaCache};
    use crate::leaderboard::{LeaderboardFilter, LeaderboardService, Timeframe, DEFAULT_LIMIT};
    use persistence::repository::{ProductRecord, UserRecord, UserRepository};
    use persistence::Database;

    async fn seed_user(db: &Database, name: &str) -> i64 {
        UserRepository::new(db.pool())
            .create(&UserRecord {
                id: None,
                name: name.into(),
                email: format!("{name}@example.com"),
                role: "founder".into(),
                avatar_url: None,
                created_at: None,
            })
            .await
            .unwrap()
    }

    async fn seed_product(db: &Database, user_id: i64, category: &str) -> i64 {
        ProductRepository::new(db.pool())
            .create(&ProductRecord {
                id: None,
                user_id,
                title: "Invoicer".into(),
                description: None,
                category: category.into(),
                status: "active".into(),
                featured: 0,
                rating_average: 0.0,
                votes_count: 0,
                url: None,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_rating_rejected_without_write() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db, "ada").await;
        let pid = seed_product(&db, uid, "saas").await;
        let svc = VoteService::new(db.pool_clone(), Arc::new(MokaCache::default()));

        for bad in [0, 6, -1] {
            let err = svc.record_vote(pid, uid, bad).await.unwrap_err();
            assert!(matches!(err, ScoringError::InvalidRating(_)));
        }

        let product = ProductRepository::new(db.pool()).get(pid).await.unwrap().unwrap();
        assert_eq!(product.votes_count, 0);
        assert_eq!(svc.get_vote(pid, uid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vote_on_missing_product_is_not_found() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db, "ada").await;
        let svc = VoteService::new(db.pool_clone(), Arc::new(MokaCache::default()));

        let err = svc.record_vote(999, uid, 4).await.unwrap_err();
        assert!(matches!(err, ScoringError::ProductNotFound(999)));
    }

    #[tokio::test]
    async fn test_rate_limit_second_vote_within_window() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db, "ada").await;
        let pid = seed_product(&db, uid, "saas").await;
        let svc = VoteService::with_window(
            db.pool_clone(),
            Arc::new(MokaCache::default()),
            Duration::from_millis(150),
        );

        svc.record_vote(pid, uid, 4).await.unwrap();
        let err = svc.record_vote(pid, uid, 5).await.unwrap_err();
        match err {
            ScoringError::RateLimited { retry_after_secs } => assert!(retry_after_secs > 0),
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // Window elapsed: the retry goes through and overwrites
        tokio::time::sleep(Duration::from_millis(200)).await;
        svc.record_vote(pid, uid, 5).await.unwrap();
        assert_eq!(svc.get_vote(pid, uid).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_user() {
        let db = Database::in_memory().await.unwrap();
        let ada = seed_user(&db, "ada").await;
        let bob = seed_user(&db, "bob").await;
        let pid = seed_product(&db, ada, "saas").await;
        let svc = VoteService::new(db.pool_clone(), Arc::new(MokaCache::default()));

        svc.record_vote(pid, ada, 4).await.unwrap();
        // A different user is not throttled by Ada's window
        svc.record_vote(pid, bob, 3).await.unwrap();

        let product = ProductRepository::new(db.pool()).get(pid).await.unwrap().unwrap();
        assert_eq!(product.votes_count, 2);
        assert_eq!(product.rating_average, 3.5);
    }

    #[tokio::test]
    async fn test_vote_evicts_category_and_all_keys_only() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db, "ada").await;
        let pid = seed_product(&db, uid, "saas").await;

        let cache = Arc::new(MokaCache::default());
        let saas_key = cache_key(Some("saas"), Timeframe::All, DEFAULT_LIMIT);
        let all_key = cache_key(None, Timeframe::Week, DEFAULT_LIMIT);
        let other_key = cache_key(Some("fintech"), Timeframe::All, DEFAULT_LIMIT);
        for key in [&saas_key, &all_key, &other_key] {
            cache.put(key, "[]".into(), Duration::from_secs(60)).await;
        }

        let svc = VoteService::new(db.pool_clone(), cache.clone());
        svc.record_vote(pid, uid, 5).await.unwrap();

        assert_eq!(cache.get(&saas_key).await, None);
        assert_eq!(cache.get(&all_key).await, None);
        assert_eq!(cache.get(&other_key).await.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_vote_then_leaderboard_recomputes() {
        let db = Database::in_memory().await.unwrap();
        let ada = seed_user(&db, "ada").await;
        let bob = seed_user(&db, "bob").await;
        let pid = seed_product(&db, ada, "saas").await;

        let cache: Arc<MokaCache> = Arc::new(MokaCache::default());
        let leaderboard = LeaderboardService::new(db.pool_clone(), cache.clone());
        let votes = VoteService::new(db.pool_clone(), cache.clone());

        let filter = LeaderboardFilter {
            category: Some("saas".into()),
            ..Default::default()
        };

        let before = leaderboard.get(&filter).await.unwrap();
        assert_eq!(before[0].votes_count, 0);
        leaderboard.get(&filter).await.unwrap();
        assert_eq!(leaderboard.stats().computations, 1);

        votes.record_vote(pid, bob, 5).await.unwrap();

        let after = leaderboard.get(&filter).await.unwrap();
        assert_eq!(leaderboard.stats().computations, 2);
        assert_eq!(after[0].votes_count, 1);
        assert_eq!(after[0].rating_average, 5.0);
    }
}
