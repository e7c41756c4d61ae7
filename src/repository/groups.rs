use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::RepositoryError;
use crate::db::models::{Group, NewGroup};
use crate::state::DbPool;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a group. A taken slug is a `Conflict`.
    async fn create(&self, group: &NewGroup) -> Result<Group, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, RepositoryError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError>;

    /// All groups ordered by title, for the post form's choice list.
    async fn list(&self) -> Result<Vec<Group>, RepositoryError>;
}

pub struct SqliteGroupRepository {
    pool: DbPool,
}

impl SqliteGroupRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

#[async_trait]
impl GroupRepository for SqliteGroupRepository {
    async fn create(&self, group: &NewGroup) -> Result<Group, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO groups (title, slug, description) VALUES (?1, ?2, ?3)",
            params![group.title, group.slug, group.description],
        )
        .map_err(|e| RepositoryError::from_insert(e, format!("group slug {}", group.slug)))?;

        Ok(Group {
            id: conn.last_insert_rowid(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, RepositoryError> {
        let conn = self.pool.get()?;
        let group = conn
            .query_row(
                "SELECT id, title, slug, description FROM groups WHERE id = ?1",
                params![id],
                map_group,
            )
            .optional()?;
        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError> {
        let conn = self.pool.get()?;
        let group = conn
            .query_row(
                "SELECT id, title, slug, description FROM groups WHERE slug = ?1",
                params![slug],
                map_group,
            )
            .optional()?;
        Ok(group)
    }

    async fn list(&self) -> Result<Vec<Group>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, title, slug, description FROM groups ORDER BY title, id")?;
        let groups = stmt
            .query_map([], map_group)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}
