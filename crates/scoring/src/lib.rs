//! Founder leaderboard domain logic
//!
//! Provides:
//! - the pure VC-style composite score calculator
//! - the leaderboard query service with read-through TTL caching
//! - the validated, rate-limited, idempotent vote ingestion path

pub mod cache;
pub mod leaderboard;
pub mod score;
pub mod votes;

use persistence::DbError;
use thiserror::Error;

/// Domain error taxonomy. Scoring arithmetic itself never errors; only
/// validation, rate limiting, lookups, and I/O do.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("rating must be an integer between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("vote limit reached, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

// Re-exports for convenience
pub use cache::{cache_key, invalidation_keys, LeaderboardCache, MokaCache, LEADERBOARD_TTL};
pub use leaderboard::{
    LeaderboardFilter, LeaderboardService, LeaderboardStats, ScoredProduct, Timeframe,
    TractionEcho, DEFAULT_LIMIT,
};
pub use score::{
    compute_product_score, round1, GrowthPair, ProductScore, ScoreBreakdown, ScoreInputs,
    TractionWeek, VcGrade,
};
pub use votes::{RateLimiter, VoteService, RATE_LIMIT_WINDOW};
