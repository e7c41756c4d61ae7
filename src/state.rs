use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::cache::PageCache;
use crate::config::Config;
use crate::repository::Repositories;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub repos: Repositories,
    pub page_cache: Arc<Mutex<PageCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let page_cache = PageCache::new(config.index_cache_ttl());
        Self {
            repos: Repositories::sqlite(db.clone()),
            db,
            config,
            page_cache: Arc::new(Mutex::new(page_cache)),
        }
    }
}
