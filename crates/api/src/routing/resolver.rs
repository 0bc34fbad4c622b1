//! Host-to-alias resolution
//!
//! Expands a hostname into its candidate patterns, fetches all matching
//! aliases from the store in one batched lookup, then walks the candidates
//! most-specific-first. Absence of a match is a normal outcome, not an
//! error.

use std::sync::Arc;
use std::time::Duration;

use sitewarden_shared::{Alias, AliasError};

use crate::store::AliasStore;

use super::expand::expand_netloc;
use super::DomainCache;

/// Host resolver with caching
#[derive(Clone)]
pub struct HostResolver<S> {
    store: S,
    cache: Arc<DomainCache>,
}

impl<S: AliasStore> HostResolver<S> {
    /// Create a new host resolver with the default cache TTL
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Arc::new(DomainCache::new()),
        }
    }

    /// Create a new host resolver with a custom cache TTL
    pub fn with_cache_ttl(store: S, ttl: Duration) -> Self {
        Self {
            store,
            cache: Arc::new(DomainCache::with_ttl(ttl)),
        }
    }

    /// Resolve `host` and optional `port` to the best-matching alias.
    ///
    /// Resolution is read-only and idempotent: identical store state yields
    /// identical results. Exactly one store round trip per uncached call,
    /// regardless of hostname depth.
    pub async fn resolve(&self, host: &str, port: Option<&str>) -> Result<Option<Alias>, AliasError> {
        if let Some(cached) = self.cache.get(host, port) {
            return Ok(cached);
        }

        let candidates = expand_netloc(host, port)?;
        let found = self.store.find_by_domains(&candidates).await?;

        let mut resolved = None;
        for candidate in &candidates {
            if let Some(alias) = found.get(&candidate.to_lowercase()) {
                resolved = Some(alias.clone());
                break;
            }
        }

        self.cache.set(host, port, resolved.clone());
        Ok(resolved)
    }

    /// Invalidate cached resolutions for a host (any port)
    pub fn invalidate_host(&self, host: &str) {
        self.cache.invalidate_host(host);
    }

    /// Invalidate cached resolutions pointing at a site
    pub fn invalidate_site(&self, site_id: i64) {
        self.cache.invalidate_site(site_id);
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Access the cache for statistics/management
    pub fn cache(&self) -> &DomainCache {
        &self.cache
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryAliasStore;
    use sitewarden_shared::NewAlias;

    async fn store_with(aliases: &[(&str, i64, bool)]) -> MemoryAliasStore {
        let store = MemoryAliasStore::new();
        for (domain, site_id, is_canonical) in aliases {
            // Ensure the site exists with a matching domain for canonicals.
            while store.site(*site_id).await.unwrap().is_none() {
                store.create_site("", "").unwrap();
            }
            if *is_canonical {
                let mut site = store.site(*site_id).await.unwrap().unwrap();
                site.domain = domain.to_string();
                store.update_site(&site).unwrap();
                store
                    .insert(NewAlias::canonical(*site_id, *domain))
                    .await
                    .unwrap();
            } else {
                store
                    .insert(NewAlias::non_canonical(*site_id, *domain))
                    .await
                    .unwrap();
            }
        }
        store
    }

    #[tokio::test]
    async fn most_specific_candidate_wins() {
        let store = store_with(&[
            ("www.example.com", 1, true),
            ("*.example.com", 2, false),
            ("*", 3, false),
        ])
        .await;
        let resolver = HostResolver::new(store);

        let alias = resolver.resolve("www.example.com", None).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 1);

        // Falls through to the wildcard for other subdomains.
        let alias = resolver.resolve("shop.example.com", None).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 2);

        // And to the bare wildcard for unrelated hosts.
        let alias = resolver.resolve("elsewhere.net", None).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 3);
    }

    #[tokio::test]
    async fn port_qualified_match_is_preferred() {
        let store = store_with(&[("example.com", 1, true), ("example.com:8000", 2, false)]).await;
        let resolver = HostResolver::new(store);

        let alias = resolver.resolve("example.com", Some("8000")).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 2);

        let alias = resolver.resolve("example.com", Some("9000")).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 1);

        let alias = resolver.resolve("example.com", None).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 1);
    }

    #[tokio::test]
    async fn resolution_is_case_insensitive() {
        let store = store_with(&[("example.com", 1, true)]).await;
        let resolver = HostResolver::new(store);

        let alias = resolver.resolve("EXAMPLE.COM", None).await.unwrap().unwrap();
        assert_eq!(alias.site_id, 1);
    }

    #[tokio::test]
    async fn not_found_is_a_normal_outcome() {
        let store = store_with(&[("example.com", 1, true)]).await;
        let resolver = HostResolver::new(store);

        assert!(resolver.resolve("unknown.net", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let store = store_with(&[("www.example.com", 1, true)]).await;
        let resolver = HostResolver::new(store);

        let first = resolver.resolve("www.example.com", Some("80")).await.unwrap();
        let second = resolver.resolve("www.example.com", Some("80")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_host_propagates() {
        let resolver = HostResolver::new(MemoryAliasStore::new());
        assert!(matches!(
            resolver.resolve("", None).await,
            Err(AliasError::InvalidHost(_))
        ));
    }

    #[tokio::test]
    async fn cache_serves_repeat_lookups_and_invalidates() {
        let store = store_with(&[("example.com", 1, true)]).await;
        let resolver = HostResolver::new(store.clone());

        let alias = resolver.resolve("example.com", None).await.unwrap().unwrap();

        // Remove the alias behind the cache's back: the cached entry still
        // answers until invalidated.
        store.delete(alias.id).await.unwrap();
        assert!(resolver.resolve("example.com", None).await.unwrap().is_some());

        resolver.invalidate_site(1);
        assert!(resolver.resolve("example.com", None).await.unwrap().is_none());
    }
}
