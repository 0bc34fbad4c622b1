//! Sitewarden API Library
//!
//! Resolves incoming hostnames to the site they belong to, keeps each
//! site's canonical alias in sync with its domain, and serves the
//! management API around both.

pub mod config;
pub mod error;
pub mod routes;
pub mod routing;
pub mod site_context;
pub mod state;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routing::{expand_netloc, DomainCache, HostResolver, ResolvedSite};
pub use site_context::{current_site_id, with_current_site, CurrentSite, SiteOverride};
pub use state::AppState;
pub use store::{AliasStore, MemoryAliasStore, PgAliasStore};
pub use sync::{CanonicalSynchronizer, SyncReport};
