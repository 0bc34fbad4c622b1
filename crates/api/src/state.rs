//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::{
    config::Config,
    routing::HostResolver,
    site_context::CurrentSite,
    store::PgAliasStore,
    sync::CanonicalSynchronizer,
};

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub resolver: HostResolver<PgAliasStore>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let store = PgAliasStore::new(pool.clone());
        let resolver =
            HostResolver::with_cache_ttl(store, Duration::from_secs(config.cache_ttl_secs));
        Self {
            pool,
            config: Arc::new(config),
            resolver,
        }
    }

    pub fn store(&self) -> PgAliasStore {
        PgAliasStore::new(self.pool.clone())
    }

    pub fn synchronizer(&self) -> CanonicalSynchronizer<PgAliasStore> {
        CanonicalSynchronizer::new(self.store())
    }

    /// A fresh site-context cell for one unit of work, seeded with the
    /// configured default. Task-confined: build one per task, do not share.
    pub fn current_site(&self) -> CurrentSite {
        CurrentSite::with_default(self.config.default_site_id)
    }
}
