use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::RepositoryError;
use crate::db::models::{NewUser, User};
use crate::state::DbPool;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. A taken username is a `Conflict`.
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, full_name, email, password_hash, is_admin, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        is_admin: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO users (username, full_name, email, password_hash, is_admin)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.username,
                user.full_name,
                user.email,
                user.password_hash,
                user.is_admin
            ],
        )
        .map_err(|e| RepositoryError::from_insert(e, format!("username {}", user.username)))?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            map_user,
        )
        .map_err(Into::into)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}
