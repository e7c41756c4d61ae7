use async_trait::async_trait;
use rusqlite::params;

use super::RepositoryError;
use crate::state::DbPool;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError>;

    /// Create the edge if missing. Returns true when a row was inserted.
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError>;

    /// Remove the edge if present. Returns true when a row was deleted.
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError>;
}

pub struct SqliteFollowRepository {
    pool: DbPool,
}

impl SqliteFollowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for SqliteFollowRepository {
    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)
             ON CONFLICT(user_id, author_id) DO NOTHING",
            params![user_id, author_id],
        )?;
        Ok(rows > 0)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repository::testing::insert_user;

    #[tokio::test]
    async fn follow_is_idempotent() {
        let pool = db::test_pool();
        let repo = SqliteFollowRepository::new(pool.clone());
        let reader = insert_user(&pool, "reader");
        let author = insert_user(&pool, "author");

        assert!(repo.follow(reader, author).await.unwrap());
        assert!(!repo.follow(reader, author).await.unwrap());
        assert!(repo.exists(reader, author).await.unwrap());
        assert!(!repo.exists(author, reader).await.unwrap());

        let edges: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))
            .unwrap();
        assert_eq!(edges, 1);
    }

    #[tokio::test]
    async fn unfollow_missing_edge_is_noop() {
        let pool = db::test_pool();
        let repo = SqliteFollowRepository::new(pool.clone());
        let reader = insert_user(&pool, "reader");
        let author = insert_user(&pool, "author");

        assert!(!repo.unfollow(reader, author).await.unwrap());

        repo.follow(reader, author).await.unwrap();
        assert!(repo.unfollow(reader, author).await.unwrap());
        assert!(!repo.exists(reader, author).await.unwrap());
    }
}
