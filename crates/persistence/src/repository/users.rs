//! Users repository — founder and admin accounts

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: Option<i64>,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user, returning the new id
    pub async fn create(&self, record: &UserRecord) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO users (name, email, role, avatar_url) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.role)
        .bind(&record.avatar_url)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, role, avatar_url, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}
