//! In-memory resolution cache with TTL
//!
//! Caches host-to-alias lookups to avoid hitting the database for every
//! request. Negative results are cached too, so unknown hosts cannot stampede
//! the store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sitewarden_shared::Alias;

/// Default cache TTL (5 minutes)
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache entry with expiration
#[derive(Clone)]
struct CacheEntry {
    alias: Option<Alias>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(alias: Option<Alias>, ttl: Duration) -> Self {
        Self {
            alias,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache key for a host and optional port.
fn cache_key(host: &str, port: Option<&str>) -> String {
    format!("{}|{}", host.to_lowercase(), port.unwrap_or(""))
}

/// Thread-safe resolution cache
pub struct DomainCache {
    /// Maps host|port -> alias (None means the host resolves to nothing)
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainCache {
    /// Create a new cache with default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create a new cache with custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get the cached resolution for a host and port.
    /// Returns Some(Some(alias)) for a cached match, Some(None) for a cached
    /// miss, and None when nothing (valid) is cached.
    pub fn get(&self, host: &str, port: Option<&str>) -> Option<Option<Alias>> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(&cache_key(host, port))?;

        if entry.is_expired() {
            None
        } else {
            Some(entry.alias.clone())
        }
    }

    /// Cache a resolution result
    pub fn set(&self, host: &str, port: Option<&str>, alias: Option<Alias>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(cache_key(host, port), CacheEntry::new(alias, self.ttl));
        }
    }

    /// Invalidate every cached entry for a host, any port
    pub fn invalidate_host(&self, host: &str) {
        let prefix = format!("{}|", host.to_lowercase());
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|key, _| !key.starts_with(&prefix));
        }
    }

    /// Invalidate all entries resolving to a site (for when its aliases change)
    pub fn invalidate_site(&self, site_id: i64) {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, entry| entry.alias.as_ref().map(|a| a.site_id) != Some(site_id));
        }
    }

    /// Drop every entry; for bulk alias rewrites where per-host
    /// invalidation would miss entries
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Clear expired entries (call periodically for memory management)
    pub fn cleanup(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, entry| !entry.is_expired());
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if let Ok(cache) = self.cache.read() {
            let total = cache.len();
            let expired = cache.values().filter(|e| e.is_expired()).count();
            CacheStats {
                total_entries: total,
                expired_entries: expired,
                active_entries: total - expired,
            }
        } else {
            CacheStats::default()
        }
    }
}

/// Cache statistics
#[derive(Default, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use time::OffsetDateTime;

    fn alias(id: i64, domain: &str, site_id: i64) -> Alias {
        let now = OffsetDateTime::now_utc();
        Alias {
            id,
            domain: domain.to_string(),
            site_id,
            is_canonical: true,
            redirect_to_canonical: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cache_get_set() {
        let cache = DomainCache::new();
        let a = alias(1, "example.com", 1);

        assert!(cache.get("example.com", None).is_none());

        cache.set("example.com", None, Some(a.clone()));
        assert_eq!(cache.get("example.com", None), Some(Some(a.clone())));
        // Port-qualified lookups are distinct entries.
        assert!(cache.get("example.com", Some("80")).is_none());
        // Host case does not matter.
        assert_eq!(cache.get("EXAMPLE.com", None), Some(Some(a)));
    }

    #[test]
    fn test_cache_negative() {
        let cache = DomainCache::new();

        cache.set("unknown.example.com", None, None);
        assert_eq!(cache.get("unknown.example.com", None), Some(None));
    }

    #[test]
    fn test_cache_expiration() {
        let cache = DomainCache::with_ttl(Duration::from_millis(50));
        cache.set("example.com", None, Some(alias(1, "example.com", 1)));
        assert!(cache.get("example.com", None).is_some());

        sleep(Duration::from_millis(60));
        assert!(cache.get("example.com", None).is_none());
    }

    #[test]
    fn test_cache_invalidate_host() {
        let cache = DomainCache::new();
        cache.set("example.com", None, Some(alias(1, "example.com", 1)));
        cache.set("example.com", Some("80"), Some(alias(1, "example.com", 1)));
        cache.set("other.com", None, None);

        cache.invalidate_host("example.com");

        assert!(cache.get("example.com", None).is_none());
        assert!(cache.get("example.com", Some("80")).is_none());
        assert_eq!(cache.get("other.com", None), Some(None));
    }

    #[test]
    fn test_cache_clear() {
        let cache = DomainCache::new();
        cache.set("a.example.com", None, Some(alias(1, "a.example.com", 7)));
        cache.set("b.example.com", None, None);

        cache.clear();

        assert!(cache.get("a.example.com", None).is_none());
        assert!(cache.get("b.example.com", None).is_none());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn test_cache_invalidate_site() {
        let cache = DomainCache::new();
        cache.set("a.example.com", None, Some(alias(1, "a.example.com", 7)));
        cache.set("b.example.com", None, Some(alias(2, "b.example.com", 7)));
        cache.set("c.example.com", None, Some(alias(3, "c.example.com", 9)));

        cache.invalidate_site(7);

        assert!(cache.get("a.example.com", None).is_none());
        assert!(cache.get("b.example.com", None).is_none());
        assert!(cache.get("c.example.com", None).is_some());
    }
}
