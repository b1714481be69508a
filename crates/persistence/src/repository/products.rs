//! Products repository — listings ranked on the community leaderboard

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A product row as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductRecord {
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub featured: i64,
    pub rating_average: f64,
    pub votes_count: i64,
    pub url: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// A leaderboard candidate: product columns plus the creator's name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub category: String,
    pub rating_average: f64,
    pub votes_count: i64,
    pub created_at: i64,
    pub creator_name: String,
}

/// Filters for the public product listing
#[derive(Debug, Clone, Default)]
pub struct ProductListFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub featured_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for product listings
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new product, returning its id
    pub async fn create(&self, record: &ProductRecord) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO products
                (user_id, title, description, category, status, featured, url)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(record.user_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.category)
        .bind(&record.status)
        .bind(record.featured)
        .bind(&record.url)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch one product by id
    pub async fn get(&self, id: i64) -> DbResult<Option<ProductRecord>> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"SELECT id, user_id, title, description, category, status, featured,
                      rating_average, votes_count, url, created_at, updated_at
               FROM products WHERE id = ?1"#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Does an *active* product with this id exist?
    pub async fn exists_active(&self, id: i64) -> DbResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM products WHERE id = ?1 AND status = 'active'")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0 > 0)
    }

    /// Public listing with optional filters (featured first, newest next)
    pub async fn list(&self, filter: &ProductListFilter) -> DbResult<Vec<ProductRecord>> {
        let mut sql = String::from(
            r#"SELECT id, user_id, title, description, category, status, featured,
                      rating_average, votes_count, url, created_at, updated_at
               FROM products
               WHERE status = ?"#,
        );

        let status = filter.status.clone().unwrap_or_else(|| "active".to_string());
        let mut binds: Vec<String> = vec![status];

        if let Some(cat) = &filter.category {
            sql.push_str(" AND category = ?");
            binds.push(cat.clone());
        }
        if filter.featured_only {
            sql.push_str(" AND featured = 1");
        }

        sql.push_str(" ORDER BY featured DESC, created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, ProductRecord>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query = query.bind(filter.limit.max(1)).bind(filter.offset.max(0));

        let records = query.fetch_all(self.pool).await?;
        Ok(records)
    }

    /// Leaderboard candidates: active products, optional category equality,
    /// optional creation-date lower bound. Ordered by raw rating as a
    /// presort hint only — final ordering is the in-memory composite sort.
    pub async fn candidates(
        &self,
        category: Option<&str>,
        created_after: Option<i64>,
    ) -> DbResult<Vec<CandidateRow>> {
        let mut sql = String::from(
            r#"SELECT p.id, p.user_id, p.title, p.category,
                      p.rating_average, p.votes_count, p.created_at,
                      u.name AS creator_name
               FROM products p
               JOIN users u ON p.user_id = u.id
               WHERE p.status = 'active'"#,
        );

        let mut str_binds: Vec<String> = Vec::new();
        if let Some(cat) = category {
            sql.push_str(" AND p.category = ?");
            str_binds.push(cat.to_string());
        }
        if created_after.is_some() {
            sql.push_str(" AND p.created_at >= ?");
        }

        sql.push_str(" ORDER BY p.rating_average DESC, p.votes_count DESC");

        let mut query = sqlx::query_as::<_, CandidateRow>(&sql);
        for b in &str_binds {
            query = query.bind(b);
        }
        if let Some(bound) = created_after {
            query = query.bind(bound);
        }

        let records = query.fetch_all(self.pool).await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::users::{UserRecord, UserRepository};
    use crate::Database;

    async fn seed_user(db: &Database) -> i64 {
        let users = UserRepository::new(db.pool());
        users
            .create(&UserRecord {
                id: None,
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: "founder".into(),
                avatar_url: None,
                created_at: None,
            })
            .await
            .unwrap()
    }

    fn product(user_id: i64, title: &str, category: &str) -> ProductRecord {
        ProductRecord {
            id: None,
            user_id,
            title: title.into(),
            description: None,
            category: category.into(),
            status: "active".into(),
            featured: 0,
            rating_average: 0.0,
            votes_count: 0,
            url: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db).await;
        let repo = ProductRepository::new(db.pool());

        let id = repo.create(&product(uid, "Invoicer", "saas")).await.unwrap();
        let fetched = repo.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Invoicer");
        assert_eq!(fetched.votes_count, 0);
        assert!(repo.exists_active(id).await.unwrap());
        assert!(!repo.exists_active(id + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_candidates_filters_by_category() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db).await;
        let repo = ProductRepository::new(db.pool());

        repo.create(&product(uid, "Invoicer", "saas")).await.unwrap();
        repo.create(&product(uid, "Dogwalker", "marketplace"))
            .await
            .unwrap();

        let all = repo.candidates(None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let saas = repo.candidates(Some("saas"), None).await.unwrap();
        assert_eq!(saas.len(), 1);
        assert_eq!(saas[0].title, "Invoicer");
        assert_eq!(saas[0].creator_name, "Ada");
    }

    #[tokio::test]
    async fn test_candidates_created_after_bound() {
        let db = Database::in_memory().await.unwrap();
        let uid = seed_user(&db).await;
        let repo = ProductRepository::new(db.pool());
        let id = repo.create(&product(uid, "Old", "saas")).await.unwrap();

        // Backdate the row beyond any timeframe bound
        sqlx::query("UPDATE products SET created_at = 1000 WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        let recent = repo.candidates(None, Some(2000)).await.unwrap();
        assert!(recent.is_empty());

        let unbounded = repo.candidates(None, None).await.unwrap();
        assert_eq!(unbounded.len(), 1);
    }
}
