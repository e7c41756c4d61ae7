use async_trait::async_trait;
use rusqlite::params;

use super::RepositoryError;
use crate::db::models::{Comment, NewComment};
use crate::state::DbPool;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &NewComment) -> Result<Comment, RepositoryError>;

    /// Comments on a post in the order they were written.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, RepositoryError>;

    async fn count_for_post(&self, post_id: i64) -> Result<i64, RepositoryError>;
}

pub struct SqliteCommentRepository {
    pool: DbPool,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
            params![comment.post_id, comment.author_id, comment.text],
        )?;

        let id = conn.last_insert_rowid();
        let created = conn.query_row(
            "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.id = ?1",
            params![id],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    text: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )?;
        Ok(created)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;

        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    text: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn count_for_post(&self, post_id: i64) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
