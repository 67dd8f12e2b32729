use std::sync::Arc;

use cache::{CounterStore, ResponseCache};
use config::Config;
use middleware::RateLimiter;
use sqlx::PgPool;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub store: Arc<dyn CounterStore>,
    pub limiter: RateLimiter,
    pub cache: ResponseCache,
}

impl AppState {
    /// Wires the limiter and the response cache onto one shared store.
    pub fn new(pool: PgPool, config: Config, store: Arc<dyn CounterStore>) -> Self {
        let limiter = RateLimiter::new(store.clone(), config.rate_limit_failure_policy);
        let cache = ResponseCache::new(store.clone(), config.cache_expire_secs);
        AppState {
            pool,
            config,
            store,
            limiter,
            cache,
        }
    }
}
