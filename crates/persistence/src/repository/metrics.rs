//! Metrics repository — snapshot time series and weekly traction reports

use crate::DbResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One self-reported traction week.
/// `revenue_amount` kept as TEXT to preserve Decimal precision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeeklyTractionRecord {
    pub id: Option<i64>,
    pub user_id: i64,
    pub year: i64,
    pub week_number: i64,
    pub revenue_amount: String,
    pub new_users: i64,
    pub active_users: i64,
    pub churned_users: i64,
    pub strongest_signal: Option<String>,
    pub created_at: Option<i64>,
}

impl WeeklyTractionRecord {
    /// Parsed revenue; malformed stored text degrades to zero
    pub fn revenue(&self) -> Decimal {
        self.revenue_amount.parse().unwrap_or(Decimal::ZERO)
    }
}

/// Dashboard summary over a user's traction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TractionSummary {
    pub current_revenue: String,
    pub current_new_users: i64,
    pub current_active_users: i64,
    pub current_churned: i64,
    pub prev_revenue: Option<String>,
    pub prev_active_users: Option<i64>,
    pub total_revenue: String,
    pub total_users_acquired: i64,
    pub avg_active_users: f64,
    pub total_churned: i64,
    pub weeks_tracked: i64,
    pub revenue_growth_wow: f64,
    pub user_growth_wow: f64,
}

/// Repository for metric snapshots and weekly traction
pub struct MetricsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MetricsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Metric snapshots (append-only)
    // ------------------------------------------------------------------

    /// Append one snapshot. `recorded_date` is an ISO date (YYYY-MM-DD).
    pub async fn insert_snapshot(
        &self,
        user_id: i64,
        metric_name: &str,
        value: f64,
        recorded_date: &str,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO user_metrics (user_id, metric_name, value, recorded_date)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(user_id)
        .bind(metric_name)
        .bind(value)
        .bind(recorded_date)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Latest snapshot value for a metric, if any
    pub async fn latest_value(&self, user_id: i64, metric_name: &str) -> DbResult<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as(
            r#"SELECT value FROM user_metrics
               WHERE user_id = ?1 AND metric_name = ?2
               ORDER BY recorded_date DESC, id DESC
               LIMIT 1"#,
        )
        .bind(user_id)
        .bind(metric_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Latest snapshot value as of a given date (inclusive)
    pub async fn value_as_of(
        &self,
        user_id: i64,
        metric_name: &str,
        date: &str,
    ) -> DbResult<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as(
            r#"SELECT value FROM user_metrics
               WHERE user_id = ?1 AND metric_name = ?2 AND recorded_date <= ?3
               ORDER BY recorded_date DESC, id DESC
               LIMIT 1"#,
        )
        .bind(user_id)
        .bind(metric_name)
        .bind(date)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(v,)| v))
    }

    // ------------------------------------------------------------------
    // Weekly traction
    // ------------------------------------------------------------------

    /// Insert or overwrite the row for (user, year, week)
    pub async fn upsert_week(&self, record: &WeeklyTractionRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO weekly_traction
                (user_id, year, week_number, revenue_amount, new_users,
                 active_users, churned_users, strongest_signal)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(user_id, year, week_number) DO UPDATE SET
                 revenue_amount = excluded.revenue_amount,
                 new_users = excluded.new_users,
                 active_users = excluded.active_users,
                 churned_users = excluded.churned_users,
                 strongest_signal = excluded.strongest_signal"#,
        )
        .bind(record.user_id)
        .bind(record.year)
        .bind(record.week_number)
        .bind(&record.revenue_amount)
        .bind(record.new_users)
        .bind(record.active_users)
        .bind(record.churned_users)
        .bind(&record.strongest_signal)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Most recent traction rows, newest first
    pub async fn latest_weeks(
        &self,
        user_id: i64,
        limit: i64,
    ) -> DbResult<Vec<WeeklyTractionRecord>> {
        let records = sqlx::query_as::<_, WeeklyTractionRecord>(
            r#"SELECT id, user_id, year, week_number, revenue_amount, new_users,
                      active_users, churned_users, strongest_signal, created_at
               FROM weekly_traction
               WHERE user_id = ?1
               ORDER BY year DESC, week_number DESC
               LIMIT ?2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Count of consecutive reported weeks ending at the most recent report.
    /// Week 1's predecessor is taken as week 52 of the prior year.
    pub async fn reporting_streak(&self, user_id: i64) -> DbResult<i64> {
        let rows = self.latest_weeks(user_id, 52).await?;
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        let mut streak: i64 = 1;
        let (mut year, mut week) = (first.year, first.week_number);
        for row in rows.iter().skip(1) {
            let (exp_year, exp_week) = if week > 1 {
                (year, week - 1)
            } else {
                (year - 1, 52)
            };
            if row.year == exp_year && row.week_number == exp_week {
                streak += 1;
                year = exp_year;
                week = exp_week;
            } else {
                break;
            }
        }

        Ok(streak)
    }

    /// Summary stats for the traction dashboard: latest vs previous week
    /// plus all-time totals, with WoW growth rounded to one decimal.
    pub async fn summary(&self, user_id: i64) -> DbResult<Option<TractionSummary>> {
        let recent = self.latest_weeks(user_id, 2).await?;
        let Some(latest) = recent.first() else {
            return Ok(None);
        };
        let previous = recent.get(1);

        let (total_revenue, total_new, avg_active, total_churned, weeks): (f64, i64, f64, i64, i64) =
            sqlx::query_as(
                r#"SELECT COALESCE(SUM(CAST(revenue_amount AS REAL)), 0),
                          COALESCE(SUM(new_users), 0),
                          COALESCE(AVG(active_users), 0),
                          COALESCE(SUM(churned_users), 0),
                          COUNT(*)
                   FROM weekly_traction WHERE user_id = ?1"#,
            )
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        let revenue_growth_wow = match previous {
            Some(prev) if prev.revenue() > Decimal::ZERO => {
                let cur: f64 = latest.revenue_amount.parse().unwrap_or(0.0);
                let old: f64 = prev.revenue_amount.parse().unwrap_or(0.0);
                round1((cur - old) / old * 100.0)
            }
            _ => 0.0,
        };
        let user_growth_wow = match previous {
            Some(prev) if prev.active_users > 0 => round1(
                (latest.active_users - prev.active_users) as f64 / prev.active_users as f64 * 100.0,
            ),
            _ => 0.0,
        };

        Ok(Some(TractionSummary {
            current_revenue: latest.revenue_amount.clone(),
            current_new_users: latest.new_users,
            current_active_users: latest.active_users,
            current_churned: latest.churned_users,
            prev_revenue: previous.map(|p| p.revenue_amount.clone()),
            prev_active_users: previous.map(|p| p.active_users),
            total_revenue: format!("{total_revenue}"),
            total_users_acquired: total_new,
            avg_active_users: avg_active,
            total_churned,
            weeks_tracked: weeks,
            revenue_growth_wow,
            user_growth_wow,
        }))
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
