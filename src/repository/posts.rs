use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::RepositoryError;
use crate::db::models::{GroupRef, ImageChange, NewPost, Post, PostChanges};
use crate::state::DbPool;

/// Which slice of the posts table a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn where_clause(&self) -> (&'static str, Option<i64>) {
        match *self {
            PostFilter::All => ("", None),
            PostFilter::Group(id) => ("WHERE p.group_id = ?1", Some(id)),
            PostFilter::Author(id) => ("WHERE p.author_id = ?1", Some(id)),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?1)",
                Some(id),
            ),
        }
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &NewPost) -> Result<Post, RepositoryError>;

    /// Apply an edit. Returns false when the post does not exist.
    async fn update(&self, id: i64, changes: &PostChanges) -> Result<bool, RepositoryError>;

    async fn find(&self, id: i64) -> Result<Option<Post>, RepositoryError>;

    /// Returns false when there was nothing to delete.
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;

    async fn count(&self, filter: PostFilter) -> Result<i64, RepositoryError>;

    /// Newest first, ties broken by id.
    async fn list(
        &self,
        filter: PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, RepositoryError>;
}

pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username, u.full_name,
            p.group_id, g.slug, g.title, p.text, p.image, p.created_at
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN groups g ON g.id = p.group_id";

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(4)?;
    let group_slug: Option<String> = row.get(5)?;
    let group_title: Option<String> = row.get(6)?;
    let group = match (group_id, group_slug, group_title) {
        (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
        _ => None,
    };

    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row.get(2)?,
        author_name: row.get(3)?,
        group,
        text: row.get(7)?,
        image: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn find_post(conn: &rusqlite::Connection, id: i64) -> Result<Option<Post>, RepositoryError> {
    let post = conn
        .query_row(
            &format!("{} WHERE p.id = ?1", POST_SELECT),
            params![id],
            map_post,
        )
        .optional()?;
    Ok(post)
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create(&self, post: &NewPost) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO posts (author_id, group_id, text, image) VALUES (?1, ?2, ?3, ?4)",
            params![post.author_id, post.group_id, post.text, post.image],
        )?;

        let id = conn.last_insert_rowid();
        find_post(&conn, id)?.ok_or_else(|| RepositoryError::NotFound(format!("post {}", id)))
    }

    async fn update(&self, id: i64, changes: &PostChanges) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = match &changes.image {
            ImageChange::Keep => conn.execute(
                "UPDATE posts SET text = ?1, group_id = ?2 WHERE id = ?3",
                params![changes.text, changes.group_id, id],
            )?,
            ImageChange::Replace(path) => conn.execute(
                "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
                params![changes.text, changes.group_id, path, id],
            )?,
            ImageChange::Clear => conn.execute(
                "UPDATE posts SET text = ?1, group_id = ?2, image = NULL WHERE id = ?3",
                params![changes.text, changes.group_id, id],
            )?,
        };

        Ok(rows > 0)
    }

    async fn find(&self, id: i64) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        find_post(&conn, id)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn count(&self, filter: PostFilter) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, arg) = filter.where_clause();
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM posts p {}", clause),
            params_from_iter(arg),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn list(
        &self,
        filter: PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, arg) = filter.where_clause();

        let mut args: Vec<i64> = arg.into_iter().collect();
        let sql = format!(
            "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ?{} OFFSET ?{}",
            POST_SELECT,
            clause,
            args.len() + 1,
            args.len() + 2
        );
        args.push(limit);
        args.push(offset);

        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params_from_iter(args), map_post)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }
}
