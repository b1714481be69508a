//! Votes repository — idempotent vote upsert plus aggregate maintenance
//!
//! The vote upsert and the recompute of the product's denormalized
//! `rating_average`/`votes_count` run in one transaction, so concurrent
//! votes from N distinct users always converge to votes_count == N.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoteRecord {
    pub id: Option<i64>,
    pub product_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub updated_at: Option<i64>,
}

/// Repository for product votes
pub struct VoteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> VoteRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a vote keyed on (product_id, user_id) and refresh the
    /// product's aggregates from the votes table, atomically.
    pub async fn record(&self, product_id: i64, user_id: i64, rating: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO product_votes (product_id, user_id, rating)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(product_id, user_id) DO UPDATE SET
                 rating = excluded.rating,
                 updated_at = strftime('%s', 'now')"#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE products SET
                 votes_count = (SELECT COUNT(*) FROM product_votes WHERE product_id = ?1),
                 rating_average = COALESCE(
                   (SELECT AVG(rating) FROM product_votes WHERE product_id = ?1), 0),
                 updated_at = strftime('%s', 'now')
               WHERE id = ?1"#,
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The caller's existing vote on a product, if any
    pub async fn get(&self, product_id: i64, user_id: i64) -> DbResult<Option<VoteRecord>> {
        let record = sqlx::query_as::<_, VoteRecord>(
            r#"SELECT id, product_id, user_id, rating, updated_at
               FROM product_votes
               WHERE product_id = ?1 AND user_id = ?2"#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}
