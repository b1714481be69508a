//! Leaderboard query service — candidate fetch, scoring, caching
//!
//! SQL narrows the candidate set and presorts by raw rating as a hint;
//! correctness depends on the in-memory sort by composite score.

use crate::cache::{cache_key, LeaderboardCache, LEADERBOARD_TTL};
use crate::score::{
    compute_product_score, round1, GrowthPair, ScoreBreakdown, ScoreInputs, TractionWeek, VcGrade,
};
use crate::ScoringError;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use persistence::repository::{
    CandidateRow, GoalRepository, InteractionRepository, MetricsRepository, ProductRepository,
};
use persistence::SqlitePool;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows returned to non-admin callers when no limit is given
pub const DEFAULT_LIMIT: i64 = 50;

const SECONDS_PER_DAY: i64 = 86_400;

/// Creation-date window for candidate products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    Month,
    Year,
    All,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Week,
        Timeframe::Month,
        Timeframe::Year,
        Timeframe::All,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    /// Epoch-seconds lower bound on product creation, if any
    pub fn cutoff_epoch(&self, now_epoch: i64) -> Option<i64> {
        let days = match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
            Self::All => return None,
        };
        Some(now_epoch - days * SECONDS_PER_DAY)
    }
}

/// One leaderboard request
#[derive(Debug, Clone)]
pub struct LeaderboardFilter {
    pub category: Option<String>,
    pub timeframe: Timeframe,
    pub limit: i64,
    pub is_admin: bool,
}

impl Default for LeaderboardFilter {
    fn default() -> Self {
        Self {
            category: None,
            timeframe: Timeframe::All,
            limit: DEFAULT_LIMIT,
            is_admin: false,
        }
    }
}

/// Raw traction numbers echoed back for UI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TractionEcho {
    pub latest_revenue: f64,
    pub new_users: i64,
    pub active_users: i64,
    pub reporting_weeks: i64,
}

/// A product row extended with its composite score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredProduct {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub category: String,
    pub creator_name: String,
    pub created_at: i64,
    pub rating_average: f64,
    pub votes_count: i64,
    pub leaderboard_score: f64,
    pub vc_score: VcGrade,
    pub growth_velocity: f64,
    pub score_breakdown: ScoreBreakdown,
    pub growth_wow: GrowthPair,
    pub growth_mom: GrowthPair,
    pub traction: Option<TractionEcho>,
}

/// Cache counters, exposed through the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub computations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Builds ranked leaderboards, read-through cached for public callers
pub struct LeaderboardService {
    pool: SqlitePool,
    cache: Arc<dyn LeaderboardCache>,
    computations: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl LeaderboardService {
    pub fn new(pool: SqlitePool, cache: Arc<dyn LeaderboardCache>) -> Self {
        Self {
            pool,
            cache,
            computations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// The ranked leaderboard for one filter. Admin requests always compute
    /// fresh and are never written to the shared cache (their unlimited
    /// result sets must not leak through public keys).
    pub async fn get(&self, filter: &LeaderboardFilter) -> Result<Vec<ScoredProduct>, ScoringError> {
        if filter.is_admin {
            return self.compute(filter).await;
        }

        let key = cache_key(filter.category.as_deref(), filter.timeframe, filter.limit);

        if let Some(body) = self.cache.get(&key).await {
            match serde_json::from_str::<Vec<ScoredProduct>>(&body) {
                Ok(list) => {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(%key, "leaderboard cache hit");
                    return Ok(list);
                }
                Err(e) => {
                    // Treat a corrupt entry as a miss
                    warn!(%key, error = %e, "discarding undecodable cache entry");
                    self.cache.delete(&key).await;
                }
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let list = self.compute(filter).await?;

        match serde_json::to_string(&list) {
            Ok(body) => self.cache.put(&key, body, LEADERBOARD_TTL).await,
            Err(e) => warn!(%key, error = %e, "failed to serialize leaderboard for cache"),
        }

        Ok(list)
    }

    pub fn stats(&self) -> LeaderboardStats {
        LeaderboardStats {
            computations: self.computations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Full aggregation: fetch candidates, assemble per-product inputs,
    /// score, and re-sort by the unrounded composite.
    async fn compute(&self, filter: &LeaderboardFilter) -> Result<Vec<ScoredProduct>, ScoringError> {
        self.computations.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        let now_epoch = now.timestamp();
        let today = now.date_naive();
        let cutoff = filter.timeframe.cutoff_epoch(now_epoch);

        let candidates = ProductRepository::new(&self.pool)
            .candidates(filter.category.as_deref(), cutoff)
            .await?;

        let mut ranked: Vec<(f64, ScoredProduct)> = Vec::with_capacity(candidates.len());
        for row in candidates {
            ranked.push(self.score_candidate(row, now_epoch, today).await?);
        }

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut list: Vec<ScoredProduct> = ranked.into_iter().map(|(_, p)| p).collect();
        if !filter.is_admin {
            list.truncate(filter.limit.max(0) as usize);
        }

        Ok(list)
    }

    async fn score_candidate(
        &self,
        row: CandidateRow,
        now_epoch: i64,
        today: NaiveDate,
    ) -> Result<(f64, ScoredProduct), ScoringError> {
        let (inputs, echo) = self
            .assemble_inputs(row.user_id, row.votes_count, row.rating_average, now_epoch, today)
            .await?;
        let score = compute_product_score(&inputs);

        let product = ScoredProduct {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            category: row.category,
            creator_name: row.creator_name,
            created_at: row.created_at,
            rating_average: row.rating_average,
            votes_count: row.votes_count,
            leaderboard_score: round1(score.final_score),
            vc_score: score.grade,
            growth_velocity: round1(score.breakdown.growth),
            score_breakdown: ScoreBreakdown {
                growth: round1(score.breakdown.growth),
                traction: round1(score.breakdown.traction),
                validation: round1(score.breakdown.validation),
                execution: round1(score.breakdown.execution),
                engagement: round1(score.breakdown.engagement),
            },
            growth_wow: score.growth_wow,
            growth_mom: score.growth_mom,
            traction: echo,
        };

        Ok((score.final_score, product))
    }

    /// Denormalized inputs for one product's owner: weekly traction,
    /// snapshot history, goal stats, and the trailing engagement count.
    /// Per-product subqueries are acceptable at this scale.
    async fn assemble_inputs(
        &self,
        user_id: i64,
        votes_count: i64,
        rating_average: f64,
        now_epoch: i64,
        today: NaiveDate,
    ) -> Result<(ScoreInputs, Option<TractionEcho>), ScoringError> {
        let metrics = MetricsRepository::new(&self.pool);
        let goals = GoalRepository::new(&self.pool);
        let interactions = InteractionRepository::new(&self.pool);

        let weeks = metrics.latest_weeks(user_id, 2).await?;
        let traction_latest = weeks.first().map(to_traction_week);
        let traction_previous = weeks.get(1).map(to_traction_week);

        let reporting_streak_weeks = if weeks.is_empty() {
            0
        } else {
            metrics.reporting_streak(user_id).await?
        };

        let d7 = (today - ChronoDuration::days(7)).format("%Y-%m-%d").to_string();
        let d30 = (today - ChronoDuration::days(30)).format("%Y-%m-%d").to_string();

        let users_now = metrics.latest_value(user_id, "users").await?;
        let users_7d_ago = metrics.value_as_of(user_id, "users", &d7).await?;
        let users_30d_ago = metrics.value_as_of(user_id, "users", &d30).await?;
        let revenue_now = metrics.latest_value(user_id, "revenue").await?;
        let revenue_7d_ago = metrics.value_as_of(user_id, "revenue", &d7).await?;
        let revenue_30d_ago = metrics.value_as_of(user_id, "revenue", &d30).await?;

        let goal_stats = goals.stats(user_id).await?;
        let recent_goal_activity = goal_stats
            .last_activity
            .map(|t| now_epoch - t <= 7 * SECONDS_PER_DAY)
            .unwrap_or(false);

        let interactions_7d = interactions
            .count_since(user_id, now_epoch - 7 * SECONDS_PER_DAY)
            .await?;

        let echo = traction_latest.map(|t| TractionEcho {
            latest_revenue: t.revenue,
            new_users: t.new_users,
            active_users: t.active_users,
            reporting_weeks: reporting_streak_weeks,
        });

        let inputs = ScoreInputs {
            users_now,
            users_7d_ago,
            users_30d_ago,
            revenue_now,
            revenue_7d_ago,
            revenue_30d_ago,
            traction_latest,
            traction_previous,
            votes_count,
            rating_average,
            goals_total: goal_stats.total,
            goals_completed: goal_stats.completed,
            goals_active: goal_stats.active,
            recent_goal_activity,
            reporting_streak_weeks,
            interactions_7d,
        };

        Ok((inputs, echo))
    }
}

fn to_traction_week(record: &persistence::repository::WeeklyTractionRecord) -> TractionWeek {
    TractionWeek {
        revenue: record.revenue().to_f64().unwrap_or(0.0),
        new_users: record.new_users,
        active_users: record.active_users,
    }
}
