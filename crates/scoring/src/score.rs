//! VC-style composite scoring — pure, total over its input domain
//!
//! Five weighted sub-scores (growth velocity, traction, validation,
//! execution, engagement), each normalized to 0–100. Absent inputs
//! contribute zero; every ratio guards its denominator. This module never
//! returns an error and performs no I/O.

use serde::{Deserialize, Serialize};

// Sub-score weights (sum to 1.0)
const GROWTH_WEIGHT: f64 = 0.35;
const TRACTION_WEIGHT: f64 = 0.25;
const VALIDATION_WEIGHT: f64 = 0.20;
const EXECUTION_WEIGHT: f64 = 0.15;
const ENGAGEMENT_WEIGHT: f64 = 0.05;

/// 1 percentage point of WoW growth = 5 score points
const GROWTH_SCALE: f64 = 5.0;
/// Growth rate substituted when a nonzero current value has no usable baseline
const NEW_ENTRANT_GROWTH_PCT: f64 = 50.0;
/// Revenue growth weighted over user growth (stronger product-market-fit signal)
const USER_GROWTH_SHARE: f64 = 0.4;
const REVENUE_GROWTH_SHARE: f64 = 0.6;

/// log10 scaling: 100k users or 100k revenue saturates its component
const TRACTION_LOG_SCALE: f64 = 20.0;
/// Revenue-per-user of 100 saturates its component
const RPU_LOG_SCALE: f64 = 50.0;

/// Votes at which the vote-count component saturates
const VOTE_REFERENCE_COUNT: f64 = 50.0;
const MAX_RATING: f64 = 5.0;

/// Interactions in the trailing week at which engagement saturates
const ENGAGEMENT_REFERENCE_COUNT: f64 = 10.0;

const COMPLETION_RATIO_POINTS: f64 = 60.0;
const ACTIVE_GOAL_BONUS: f64 = 15.0;
const RECENT_ACTIVITY_BONUS: f64 = 10.0;
const CONSISTENCY_BONUS: f64 = 15.0;
/// Consecutive reporting weeks required for the consistency bonus
const CONSISTENCY_STREAK_WEEKS: i64 = 4;

/// One week of self-reported traction, flattened for scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TractionWeek {
    pub revenue: f64,
    pub new_users: i64,
    pub active_users: i64,
}

/// Denormalized per-product aggregates assembled at the persistence
/// boundary. Every field defaults to "no signal"; the calculator treats
/// `None`/zero identically to missing data.
#[derive(Debug, Clone, Default)]
pub struct ScoreInputs {
    pub users_now: Option<f64>,
    pub users_7d_ago: Option<f64>,
    pub users_30d_ago: Option<f64>,
    pub revenue_now: Option<f64>,
    pub revenue_7d_ago: Option<f64>,
    pub revenue_30d_ago: Option<f64>,
    pub traction_latest: Option<TractionWeek>,
    pub traction_previous: Option<TractionWeek>,
    pub votes_count: i64,
    pub rating_average: f64,
    pub goals_total: i64,
    pub goals_completed: i64,
    pub goals_active: i64,
    pub recent_goal_activity: bool,
    pub reporting_streak_weeks: i64,
    pub interactions_7d: i64,
}

/// The five sub-scores, each 0–100
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub growth: f64,
    pub traction: f64,
    pub validation: f64,
    pub execution: f64,
    pub engagement: f64,
}

/// WoW / MoM growth percentages echoed for display
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GrowthPair {
    pub users: f64,
    pub revenue: f64,
}

/// Letter grade — a monotonic step function of the unrounded composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VcGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl VcGrade {
    /// Thresholds are inclusive on the upper side: 80.0 is already A+
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::APlus
        } else if score >= 70.0 {
            Self::A
        } else if score >= 60.0 {
            Self::BPlus
        } else if score >= 50.0 {
            Self::B
        } else if score >= 40.0 {
            Self::CPlus
        } else if score >= 30.0 {
            Self::C
        } else {
            Self::D
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl std::fmt::Display for VcGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite score for one product
#[derive(Debug, Clone)]
pub struct ProductScore {
    /// Unrounded weighted sum; round with [`round1`] for display
    pub final_score: f64,
    pub grade: VcGrade,
    pub breakdown: ScoreBreakdown,
    pub growth_wow: GrowthPair,
    pub growth_mom: GrowthPair,
}

/// Round to one decimal place for display
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Compute the composite score from one denormalized input row
pub fn compute_product_score(inputs: &ScoreInputs) -> ProductScore {
    let breakdown = ScoreBreakdown {
        growth: growth_score(inputs),
        traction: traction_score(inputs),
        validation: validation_score(inputs),
        execution: execution_score(inputs),
        engagement: engagement_score(inputs),
    };

    let final_score = breakdown.growth * GROWTH_WEIGHT
        + breakdown.traction * TRACTION_WEIGHT
        + breakdown.validation * VALIDATION_WEIGHT
        + breakdown.execution * EXECUTION_WEIGHT
        + breakdown.engagement * ENGAGEMENT_WEIGHT;

    ProductScore {
        final_score,
        grade: VcGrade::from_score(final_score),
        breakdown,
        growth_wow: wow_display(inputs),
        growth_mom: mom_display(inputs),
    }
}

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

/// Growth rate in percent. A missing or zero baseline with a nonzero
/// current value yields the fixed new-entrant rate instead of dividing.
fn growth_rate(current: f64, baseline: Option<f64>) -> f64 {
    match baseline {
        Some(prev) if prev > 0.0 => (current - prev) / prev * 100.0,
        _ if current > 0.0 => NEW_ENTRANT_GROWTH_PCT,
        _ => 0.0,
    }
}

fn scale_growth(pct: f64) -> f64 {
    (pct * GROWTH_SCALE).clamp(0.0, 100.0)
}

/// WoW deltas from weekly traction when both weeks exist, else the
/// 7-day-ago snapshot comparison.
fn growth_score(inputs: &ScoreInputs) -> f64 {
    let user_pct = match (inputs.traction_latest, inputs.traction_previous) {
        (Some(latest), Some(prev)) => growth_rate(
            latest.active_users as f64,
            Some(prev.active_users as f64),
        ),
        _ => growth_rate(inputs.users_now.unwrap_or(0.0), inputs.users_7d_ago),
    };
    let revenue_pct = match (inputs.traction_latest, inputs.traction_previous) {
        (Some(latest), Some(prev)) => growth_rate(latest.revenue, Some(prev.revenue)),
        _ => growth_rate(inputs.revenue_now.unwrap_or(0.0), inputs.revenue_7d_ago),
    };

    scale_growth(user_pct) * USER_GROWTH_SHARE + scale_growth(revenue_pct) * REVENUE_GROWTH_SHARE
}

/// Log-scaled scale: an order of magnitude is a fixed increment, so a
/// single large outlier cannot dominate the ranking.
fn traction_score(inputs: &ScoreInputs) -> f64 {
    let users = inputs
        .traction_latest
        .map(|t| t.active_users as f64)
        .or(inputs.users_now)
        .unwrap_or(0.0)
        .max(0.0);
    let revenue = inputs
        .traction_latest
        .map(|t| t.revenue)
        .or(inputs.revenue_now)
        .unwrap_or(0.0)
        .max(0.0);

    let users_component = ((users + 1.0).log10() * TRACTION_LOG_SCALE).clamp(0.0, 100.0);
    let revenue_component = ((revenue + 1.0).log10() * TRACTION_LOG_SCALE).clamp(0.0, 100.0);

    let rpu = if users > 0.0 { revenue / users } else { 0.0 };
    let rpu_component = ((rpu + 1.0).log10() * RPU_LOG_SCALE).clamp(0.0, 100.0);

    // Capped contribution: acquisition volume beyond 100/week adds nothing
    let acquisition = inputs
        .traction_latest
        .map(|t| t.new_users as f64)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);

    users_component * 0.30 + revenue_component * 0.40 + rpu_component * 0.20 + acquisition * 0.10
}

/// Zero without votes: a default rating_average is not a validation signal
fn validation_score(inputs: &ScoreInputs) -> f64 {
    if inputs.votes_count <= 0 {
        return 0.0;
    }

    let votes_component =
        (inputs.votes_count as f64 / VOTE_REFERENCE_COUNT * 100.0).clamp(0.0, 100.0);
    let rating_component = (inputs.rating_average / MAX_RATING * 100.0).clamp(0.0, 100.0);

    votes_component * 0.40 + rating_component * 0.60
}

fn execution_score(inputs: &ScoreInputs) -> f64 {
    let completion_ratio = if inputs.goals_total > 0 {
        inputs.goals_completed as f64 / inputs.goals_total as f64
    } else {
        0.0
    };

    let mut score = completion_ratio * COMPLETION_RATIO_POINTS;
    if inputs.goals_active > 0 {
        score += ACTIVE_GOAL_BONUS;
    }
    if inputs.recent_goal_activity {
        score += RECENT_ACTIVITY_BONUS;
    }
    // Rewards reporting discipline independent of the metrics themselves
    if inputs.reporting_streak_weeks >= CONSISTENCY_STREAK_WEEKS {
        score += CONSISTENCY_BONUS;
    }

    score.min(100.0)
}

fn engagement_score(inputs: &ScoreInputs) -> f64 {
    (inputs.interactions_7d as f64 / ENGAGEMENT_REFERENCE_COUNT * 100.0).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Display echoes
// ---------------------------------------------------------------------------

/// Raw percentage change with a guarded denominator (display only)
fn pct_change(current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev > 0.0 => (current - prev) / prev * 100.0,
        _ => 0.0,
    }
}

fn wow_display(inputs: &ScoreInputs) -> GrowthPair {
    match (inputs.traction_latest, inputs.traction_previous) {
        (Some(latest), Some(prev)) => GrowthPair {
            users: round1(pct_change(
                latest.active_users as f64,
                Some(prev.active_users as f64),
            )),
            revenue: round1(pct_change(latest.revenue, Some(prev.revenue))),
        },
        _ => GrowthPair {
            users: round1(pct_change(
                inputs.users_now.unwrap_or(0.0),
                inputs.users_7d_ago,
            )),
            revenue: round1(pct_change(
                inputs.revenue_now.unwrap_or(0.0),
                inputs.revenue_7d_ago,
            )),
        },
    }
}

fn mom_display(inputs: &ScoreInputs) -> GrowthPair {
    GrowthPair {
        users: round1(pct_change(
            inputs.users_now.unwrap_or(0.0),
            inputs.users_30d_ago,
        )),
        revenue: round1(pct_change(
            inputs.revenue_now.unwrap_or(0.0),
            inputs.revenue_30d_ago,
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn traction(revenue: f64, new_users: i64, active_users: i64) -> TractionWeek {
        TractionWeek {
            revenue,
            new_users,
            active_users,
        }
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        let score = compute_product_score(&ScoreInputs::default());
        assert_eq!(score.final_score, 0.0);
        assert_eq!(score.grade, VcGrade::D);
        assert_eq!(score.breakdown.growth, 0.0);
        assert_eq!(score.breakdown.validation, 0.0);
    }

    #[test]
    fn test_grade_boundary_inclusive_upper() {
        assert_eq!(VcGrade::from_score(79.9), VcGrade::A);
        assert_eq!(VcGrade::from_score(80.0), VcGrade::APlus);
        assert_eq!(VcGrade::from_score(69.9), VcGrade::BPlus);
        assert_eq!(VcGrade::from_score(70.0), VcGrade::A);
        assert_eq!(VcGrade::from_score(29.9), VcGrade::D);
        assert_eq!(VcGrade::from_score(30.0), VcGrade::C);
    }

    #[test]
    fn test_zero_votes_floor_validation() {
        // rating_average may carry a nonzero default; without votes it is noise
        let inputs = ScoreInputs {
            votes_count: 0,
            rating_average: 4.8,
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        assert_eq!(score.breakdown.validation, 0.0);
    }

    #[test]
    fn test_validation_combines_votes_and_rating() {
        let inputs = ScoreInputs {
            votes_count: 50,
            rating_average: 5.0,
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        assert_eq!(score.breakdown.validation, 100.0);

        let half = ScoreInputs {
            votes_count: 25,
            rating_average: 2.5,
            ..Default::default()
        };
        let score = compute_product_score(&half);
        // 0.4 * 50 + 0.6 * 50
        assert_eq!(score.breakdown.validation, 50.0);
    }

    #[test]
    fn test_revenue_monotonicity_in_latest_week() {
        let base = ScoreInputs {
            traction_latest: Some(traction(1000.0, 20, 500)),
            traction_previous: Some(traction(900.0, 15, 450)),
            votes_count: 10,
            rating_average: 4.0,
            ..Default::default()
        };
        let mut higher = base.clone();
        higher.traction_latest = Some(traction(5000.0, 20, 500));

        let low = compute_product_score(&base).final_score;
        let high = compute_product_score(&higher).final_score;
        assert!(
            high >= low,
            "raising latest revenue must not lower the score ({low} -> {high})"
        );
        assert!(high > low);
    }

    #[test]
    fn test_new_entrant_growth_is_positive() {
        // First ever traction week, nothing to compare against
        let inputs = ScoreInputs {
            traction_latest: Some(traction(100.0, 5, 10)),
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        // 50% substituted rate × 5 saturates both growth components
        assert_eq!(score.breakdown.growth, 100.0);
        // Display shows no fabricated delta
        assert_eq!(score.growth_wow.revenue, 0.0);
    }

    #[test]
    fn test_negative_growth_clamps_to_zero() {
        let inputs = ScoreInputs {
            traction_latest: Some(traction(500.0, 5, 40)),
            traction_previous: Some(traction(1000.0, 10, 80)),
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        assert_eq!(score.breakdown.growth, 0.0);
        assert_eq!(score.growth_wow.revenue, -50.0);
        assert_eq!(score.growth_wow.users, -50.0);
    }

    #[test]
    fn test_weekly_traction_preferred_over_snapshots() {
        // Snapshots say flat; traction says +20% — traction wins
        let inputs = ScoreInputs {
            users_now: Some(100.0),
            users_7d_ago: Some(100.0),
            revenue_now: Some(100.0),
            revenue_7d_ago: Some(100.0),
            traction_latest: Some(traction(1200.0, 10, 120)),
            traction_previous: Some(traction(1000.0, 10, 100)),
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        // 20% × 5 = 100 on both components
        assert_eq!(score.breakdown.growth, 100.0);
        assert_eq!(score.growth_wow.users, 20.0);
    }

    #[test]
    fn test_snapshot_fallback_growth() {
        let inputs = ScoreInputs {
            users_now: Some(110.0),
            users_7d_ago: Some(100.0),
            revenue_now: Some(105.0),
            revenue_7d_ago: Some(100.0),
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        // users: 10% × 5 = 50; revenue: 5% × 5 = 25 → 0.4*50 + 0.6*25 = 35
        assert!((score.breakdown.growth - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_traction_log_scaling_saturates() {
        // 100k users, $10M revenue, rpu = 100, 200 new users/week
        let inputs = ScoreInputs {
            traction_latest: Some(traction(10_000_000.0, 200, 100_000)),
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        // All four components at their caps
        assert!((score.breakdown.traction - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_traction_order_of_magnitude_increment() {
        let small = ScoreInputs {
            users_now: Some(100.0),
            ..Default::default()
        };
        let large = ScoreInputs {
            users_now: Some(1000.0),
            ..Default::default()
        };
        let s = compute_product_score(&small).breakdown.traction;
        let l = compute_product_score(&large).breakdown.traction;
        // 10× users ≈ one fixed step of 0.3 × 20 = 6 points
        assert!((l - s - 6.0).abs() < 0.1);
    }

    #[test]
    fn test_execution_bonuses_and_cap() {
        let inputs = ScoreInputs {
            goals_total: 4,
            goals_completed: 4,
            goals_active: 1,
            recent_goal_activity: true,
            reporting_streak_weeks: 4,
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        // 60 + 15 + 10 + 15 = 100, capped
        assert_eq!(score.breakdown.execution, 100.0);

        let partial = ScoreInputs {
            goals_total: 4,
            goals_completed: 2,
            goals_active: 1,
            reporting_streak_weeks: 3,
            ..Default::default()
        };
        let score = compute_product_score(&partial);
        // 30 + 15, streak too short, no recent activity
        assert_eq!(score.breakdown.execution, 45.0);
    }

    #[test]
    fn test_engagement_saturation() {
        let some = ScoreInputs {
            interactions_7d: 5,
            ..Default::default()
        };
        assert_eq!(compute_product_score(&some).breakdown.engagement, 50.0);

        let lots = ScoreInputs {
            interactions_7d: 40,
            ..Default::default()
        };
        assert_eq!(compute_product_score(&lots).breakdown.engagement, 100.0);
    }

    #[test]
    fn test_weights_sum_on_saturated_inputs() {
        let inputs = ScoreInputs {
            traction_latest: Some(traction(10_000_000.0, 200, 100_000)),
            traction_previous: Some(traction(10_000.0, 100, 10_000)),
            votes_count: 100,
            rating_average: 5.0,
            goals_total: 1,
            goals_completed: 1,
            goals_active: 1,
            recent_goal_activity: true,
            reporting_streak_weeks: 10,
            interactions_7d: 50,
            ..Default::default()
        };
        let score = compute_product_score(&inputs);
        assert!(score.final_score > 99.0 && score.final_score <= 100.0);
        assert_eq!(score.grade, VcGrade::APlus);
    }

    #[test]
    fn test_grade_serializes_as_label() {
        assert_eq!(
            serde_json::to_string(&VcGrade::APlus).unwrap(),
            "\"A+\""
        );
        assert_eq!(serde_json::to_string(&VcGrade::B).unwrap(), "\"B\"");
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(79.95), 80.0);
        assert_eq!(round1(-12.34), -12.3);
    }
}
