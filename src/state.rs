//! Application state shared across the web handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{CacheStore, CachedClient, TeamFormCache};
use crate::football::FootballApi;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub api: Arc<FootballApi>,
    /// The cached fetch path every upstream-backed handler goes through.
    pub cached: CachedClient,
    /// Stale-while-revalidate history cache behind the form endpoint.
    pub team_form: TeamFormCache,
}

impl AppState {
    pub fn new(api: Arc<FootballApi>, db_pool: PgPool) -> Self {
        let store = CacheStore::new(db_pool.clone());
        Self {
            cached: CachedClient::new(Arc::clone(&api), store),
            team_form: TeamFormCache::new(Arc::clone(&api), db_pool.clone()),
            api,
            db_pool,
        }
    }
}
