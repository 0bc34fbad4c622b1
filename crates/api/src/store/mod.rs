//! Alias persistence
//!
//! The [`AliasStore`] trait is the seam between the resolution core and
//! whatever actually holds alias records. The production implementation is
//! [`PgAliasStore`]; [`MemoryAliasStore`] backs tests and local runs.
//!
//! Every write re-validates the alias invariants and reports all field
//! violations at once. Store-level uniqueness constraints remain the last
//! line of defense: a racing write that slips past validation surfaces as
//! [`AliasError::Conflict`](sitewarden_shared::AliasError::Conflict).

mod memory;
mod postgres;

use std::collections::HashMap;

use sitewarden_shared::{Alias, AliasError, NewAlias, Site};

pub use memory::MemoryAliasStore;
pub use postgres::PgAliasStore;

/// Storage operations the resolver and synchronizer need.
#[allow(async_fn_in_trait)]
pub trait AliasStore {
    /// Batched case-insensitive exact-match lookup. Returns a map keyed by
    /// the lowercased stored domain. One store round trip regardless of how
    /// many candidates the expander produced.
    async fn find_by_domains(&self, domains: &[String]) -> Result<HashMap<String, Alias>, AliasError>;

    async fn get(&self, id: i64) -> Result<Option<Alias>, AliasError>;

    async fn list(&self) -> Result<Vec<Alias>, AliasError>;

    async fn aliases_for_site(&self, site_id: i64) -> Result<Vec<Alias>, AliasError>;

    async fn canonical_for_site(&self, site_id: i64) -> Result<Option<Alias>, AliasError>;

    /// All canonical aliases, for bulk synchronization.
    async fn canonical_aliases(&self) -> Result<Vec<Alias>, AliasError>;

    /// Insert after validating; no partial write on failure.
    async fn insert(&self, alias: NewAlias) -> Result<Alias, AliasError>;

    /// Update after re-validating; no partial write on failure.
    async fn update(&self, alias: &Alias) -> Result<Alias, AliasError>;

    /// Delete by id. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, AliasError>;

    async fn site(&self, id: i64) -> Result<Option<Site>, AliasError>;

    /// Sites with a non-blank domain but no canonical alias.
    async fn sites_missing_canonical(&self) -> Result<Vec<Site>, AliasError>;
}
