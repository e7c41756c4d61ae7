// Repository layer - every SQL statement the handlers need lives behind these traits
pub mod comments;
pub mod follows;
pub mod groups;
pub mod posts;
pub mod users;

use std::sync::Arc;
use thiserror::Error;

pub use comments::{CommentRepository, SqliteCommentRepository};
pub use follows::{FollowRepository, SqliteFollowRepository};
pub use groups::{GroupRepository, SqliteGroupRepository};
pub use posts::{PostFilter, PostRepository, SqlitePostRepository};
pub use users::{SqliteUserRepository, UserRepository};

use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Turn a UNIQUE/constraint failure into `Conflict`, pass anything else through.
    pub(crate) fn from_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RepositoryError::Conflict(what.into())
            }
            _ => RepositoryError::Sql(err),
        }
    }
}

pub type DynUserRepository = Arc<dyn UserRepository>;
pub type DynGroupRepository = Arc<dyn GroupRepository>;
pub type DynPostRepository = Arc<dyn PostRepository>;
pub type DynCommentRepository = Arc<dyn CommentRepository>;
pub type DynFollowRepository = Arc<dyn FollowRepository>;

/// One handle per entity, all backed by the same pool.
#[derive(Clone)]
pub struct Repositories {
    pub users: DynUserRepository,
    pub groups: DynGroupRepository,
    pub posts: DynPostRepository,
    pub comments: DynCommentRepository,
    pub follows: DynFollowRepository,
}

impl Repositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            groups: Arc::new(SqliteGroupRepository::new(pool.clone())),
            posts: Arc::new(SqlitePostRepository::new(pool.clone())),
            comments: Arc::new(SqliteCommentRepository::new(pool.clone())),
            follows: Arc::new(SqliteFollowRepository::new(pool)),
        }
    }
}
