//! Agent interactions repository — engagement events from AI-agent chats

use crate::DbResult;
use sqlx::SqlitePool;

pub struct InteractionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InteractionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one interaction event
    pub async fn record(&self, user_id: i64, agent: &str) -> DbResult<i64> {
        let result =
            sqlx::query("INSERT INTO agent_interactions (user_id, agent) VALUES (?1, ?2)")
                .bind(user_id)
                .bind(agent)
                .execute(self.pool)
                .await?;

        Ok(result.last_insert_rowid())
    }

    /// Events for a user since an epoch-seconds cutoff
    pub async fn count_since(&self, user_id: i64, since_epoch: i64) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM agent_interactions WHERE user_id = ?1 AND created_at >= ?2",
        )
        .bind(user_id)
        .bind(since_epoch)
        .fetch_one(self.pool)
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::users::{UserRecord, UserRepository};
    use crate::Database;

    #[tokio::test]
    async fn test_count_since_cutoff() {
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

        let repo = InteractionRepository::new(db.pool());
        repo.record(uid, "marketing").await.unwrap();
        repo.record(uid, "metrics").await.unwrap();

        assert_eq!(repo.count_since(uid, 0).await.unwrap(), 2);
        assert_eq!(repo.count_since(uid, i64::MAX).await.unwrap(), 0);
        assert_eq!(repo.count_since(uid + 1, 0).await.unwrap(), 0);
    }
}
