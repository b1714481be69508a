//! Goals repository — counts and recency feed the execution score

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GoalRecord {
    pub id: Option<i64>,
    pub user_id: i64,
    pub description: String,
    pub status: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Aggregate goal counts for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalStats {
    pub total: i64,
    pub completed: i64,
    pub active: i64,
    /// Epoch seconds of the most recent create/update, if any
    pub last_activity: Option<i64>,
}

pub struct GoalRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GoalRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, description: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO goals (user_id, description) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(description)
            .execute(self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Mark a goal completed; returns false when the goal does not belong
    /// to the caller (or does not exist)
    pub async fn complete(&self, goal_id: i64, user_id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"UPDATE goals SET status = 'completed', updated_at = strftime('%s', 'now')
               WHERE id = ?1 AND user_id = ?2"#,
        )
        .bind(goal_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All of a user's goals, newest first
    pub async fn list(&self, user_id: i64) -> DbResult<Vec<GoalRecord>> {
        let records = sqlx::query_as::<_, GoalRecord>(
            r#"SELECT id, user_id, description, status, created_at, updated_at
               FROM goals
               WHERE user_id = ?1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn stats(&self, user_id: i64) -> DbResult<GoalStats> {
        let (total, completed, active, last_activity): (i64, i64, i64, Option<i64>) =
            sqlx::query_as(
                r#"SELECT COUNT(*),
                          COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                          COALESCE(SUM(CASE WHEN status IN ('active', 'in_progress') THEN 1 ELSE 0 END), 0),
                          MAX(updated_at)
                   FROM goals WHERE user_id = ?1"#,
            )
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok(GoalStats {
            total,
            completed,
            active,
            last_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::users::{UserRecord, UserRepository};
    use crate::Database;

    #[tokio::test]
    async fn test_goal_lifecycle_and_stats() {
        let db = Database::in_memory().await.unwrap();
        let uid = UserRepository::new(db.pool())
            .create(&UserRecord {
                id: None,
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: "founder".into(),
                avatar_url: None,
                created_at: None,
            })
            .await
            .unwrap();

        let repo = GoalRepository::new(db.pool());
        let g1 = repo.create(uid, "Ship landing page").await.unwrap();
        repo.create(uid, "First 10 customers").await.unwrap();

        assert!(repo.complete(g1, uid).await.unwrap());
        // Wrong owner: no-op
        assert!(!repo.complete(g1, uid + 1).await.unwrap());

        let stats = repo.stats(uid).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 1);
        assert!(stats.last_activity.is_some());

        let goals = repo.list(uid).await.unwrap();
        assert_eq!(goals.len(), 2);
        assert!(goals.iter().any(|g| g.status == "completed"));
    }
}
