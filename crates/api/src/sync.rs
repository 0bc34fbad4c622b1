//! Canonical alias synchronization
//!
//! Keeps the invariant "each site with a domain has exactly one canonical
//! alias carrying that domain" as sites are created, renamed, and cleared.
//! The store's uniqueness constraints back these read-then-write sequences
//! under concurrency; a constraint violation from a racing writer surfaces
//! as a conflict rather than being merged silently.

use serde::Serialize;

use sitewarden_shared::{Alias, AliasError, NewAlias, Site, ValidationErrors};

use crate::store::AliasStore;

/// Outcome counts for a bulk synchronization run.
///
/// A second run over unchanged data reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    fn merge(self, other: SyncReport) -> SyncReport {
        SyncReport {
            created: self.created + other.created,
            updated: self.updated + other.updated,
            deleted: self.deleted + other.deleted,
        }
    }
}

/// Maintains canonical aliases in response to site lifecycle events.
#[derive(Clone)]
pub struct CanonicalSynchronizer<S> {
    store: S,
}

impl<S: AliasStore> CanonicalSynchronizer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create or correct the canonical alias for one site.
    ///
    /// Idempotent: a site whose canonical alias already matches is left
    /// untouched. A blank site domain routes to the blank-domain rule and
    /// yields no alias.
    pub async fn sync_site(&self, site: &Site) -> Result<Option<Alias>, AliasError> {
        if site.domain.is_empty() {
            self.sync_blank_domain(site).await?;
            return Ok(None);
        }

        match self.store.canonical_for_site(site.id).await? {
            Some(alias) if alias.domain == site.domain => Ok(Some(alias)),
            Some(mut alias) => {
                tracing::debug!(
                    site_id = site.id,
                    old = %alias.domain,
                    new = %site.domain,
                    "rewriting canonical alias domain"
                );
                alias.domain = site.domain.clone();
                Ok(Some(self.store.update(&alias).await?))
            }
            None => {
                tracing::debug!(site_id = site.id, domain = %site.domain, "creating canonical alias");
                Ok(Some(
                    self.store
                        .insert(NewAlias::canonical(site.id, &site.domain))
                        .await?,
                ))
            }
        }
    }

    /// A site's domain was cleared to blank.
    ///
    /// Deletes the canonical alias when it is the site's only alias. Any
    /// surviving non-canonical aliases make the state ambiguous, so nothing
    /// is deleted and the caller gets an error.
    async fn sync_blank_domain(&self, site: &Site) -> Result<bool, AliasError> {
        let aliases = self.store.aliases_for_site(site.id).await?;
        match aliases.as_slice() {
            [] => Ok(false),
            [alias] if alias.is_canonical => {
                self.store.delete(alias.id).await?;
                Ok(true)
            }
            _ => Err(AliasError::InconsistentState(format!(
                "site {} has a blank domain but other aliases still reference it",
                site.id
            ))),
        }
    }

    /// Validate a prospective domain change before the site row is written.
    ///
    /// Read-only. Surfaces the blank-domain rule and canonical-domain
    /// collisions up front so callers can refuse the site write instead of
    /// committing a row whose alias sync would then fail, stranding the
    /// site and its stale canonical alias.
    pub async fn check_domain_change(
        &self,
        site: &Site,
        new_domain: &str,
    ) -> Result<(), AliasError> {
        if new_domain == site.domain {
            return Ok(());
        }
        if new_domain.is_empty() {
            let aliases = self.store.aliases_for_site(site.id).await?;
            return match aliases.as_slice() {
                [] => Ok(()),
                [alias] if alias.is_canonical => Ok(()),
                _ => Err(AliasError::InconsistentState(format!(
                    "other aliases still reference site {}; refusing to clear its domain",
                    site.id
                ))),
            };
        }
        let taken = self.store.find_by_domains(&[new_domain.to_string()]).await?;
        if let Some(existing) = taken.get(&new_domain.to_lowercase()) {
            // The site's own canonical alias is the one the sync rewrites.
            if existing.site_id != site.id || !existing.is_canonical {
                let mut errors = ValidationErrors::default();
                errors.push("domain", new_domain, "domain is already in use by another alias");
                return errors.into_result();
            }
        }
        Ok(())
    }

    /// Site lifecycle event: domain changed. No-op when nothing changed.
    pub async fn site_domain_changed(&self, old_domain: &str, site: &Site) -> Result<(), AliasError> {
        if old_domain != site.domain {
            self.sync_site(site).await?;
        }
        Ok(())
    }

    /// Site lifecycle event: site created. Safe to invoke repeatedly.
    pub async fn site_created(&self, site: &Site) -> Result<(), AliasError> {
        self.sync_site(site).await?;
        Ok(())
    }

    /// Bootstrap hook, run once alias storage is provisioned.
    pub async fn storage_ready(&self) -> Result<SyncReport, AliasError> {
        self.sync_all().await
    }

    /// Correct existing canonical aliases whose domain drifted from their
    /// site's. `site_ids: None` touches all of them (the permissive
    /// default); a filter restricts the sweep. Never creates missing
    /// aliases; see [`sync_missing`](Self::sync_missing).
    pub async fn sync_many(&self, site_ids: Option<&[i64]>) -> Result<SyncReport, AliasError> {
        let mut report = SyncReport::default();
        for mut alias in self.store.canonical_aliases().await? {
            if let Some(ids) = site_ids {
                if !ids.contains(&alias.site_id) {
                    continue;
                }
            }
            let Some(site) = self.store.site(alias.site_id).await? else {
                continue;
            };
            if !site.domain.is_empty() && alias.domain != site.domain {
                alias.domain = site.domain.clone();
                // A failed write propagates; no silent skips.
                self.store.update(&alias).await?;
                report.updated += 1;
            }
        }
        Ok(report)
    }

    /// Create canonical aliases for sites that have none.
    pub async fn sync_missing(&self) -> Result<SyncReport, AliasError> {
        let mut report = SyncReport::default();
        for site in self.store.sites_missing_canonical().await? {
            if self.sync_site(&site).await?.is_some() {
                report.created += 1;
            }
        }
        Ok(report)
    }

    /// Correct every drifted canonical alias and create every missing one.
    /// Idempotent and order-independent.
    pub async fn sync_all(&self) -> Result<SyncReport, AliasError> {
        let corrected = self.sync_many(None).await?;
        let created = self.sync_missing().await?;
        Ok(corrected.merge(created))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routing::HostResolver;
    use crate::store::MemoryAliasStore;

    fn setup() -> (MemoryAliasStore, CanonicalSynchronizer<MemoryAliasStore>) {
        let store = MemoryAliasStore::new();
        (store.clone(), CanonicalSynchronizer::new(store))
    }

    #[tokio::test]
    async fn site_creation_produces_one_canonical_alias() {
        let (store, sync) = setup();
        let site = store.create_site("example.com", "Example").unwrap();

        sync.site_created(&site).await.unwrap();
        // Safe to fire twice.
        sync.site_created(&site).await.unwrap();

        let aliases = store.aliases_for_site(site.id).await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].domain, "example.com");
        assert!(aliases[0].is_canonical);
    }

    #[tokio::test]
    async fn blank_domain_site_gets_no_alias() {
        let (store, sync) = setup();
        let site = store.create_site("", "No domain yet").unwrap();

        sync.site_created(&site).await.unwrap();
        assert!(store.aliases_for_site(site.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn domain_change_rewrites_the_same_alias() {
        let (store, sync) = setup();
        let mut site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();
        let before = store.canonical_for_site(site.id).await.unwrap().unwrap();

        site.domain = "example.org".to_string();
        let site = store.update_site(&site).unwrap();
        sync.site_domain_changed("example.com", &site).await.unwrap();

        let aliases = store.aliases_for_site(site.id).await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].id, before.id);
        assert_eq!(aliases[0].domain, "example.org");
    }

    #[tokio::test]
    async fn unchanged_domain_event_is_a_noop() {
        let (store, sync) = setup();
        let site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();
        let before = store.canonical_for_site(site.id).await.unwrap().unwrap();

        sync.site_domain_changed("example.com", &site).await.unwrap();
        let after = store.canonical_for_site(site.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn clearing_domain_deletes_the_lone_canonical_alias() {
        let (store, sync) = setup();
        let mut site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();

        site.domain = String::new();
        let site = store.update_site(&site).unwrap();
        sync.site_domain_changed("example.com", &site).await.unwrap();

        assert!(store.aliases_for_site(site.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clearing_domain_with_surviving_aliases_is_inconsistent() {
        let (store, sync) = setup();
        let mut site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();
        store
            .insert(NewAlias::non_canonical(site.id, "www.example.com"))
            .await
            .unwrap();

        site.domain = String::new();
        let site = store.update_site(&site).unwrap();
        let err = sync.site_domain_changed("example.com", &site).await.unwrap_err();
        assert!(matches!(err, AliasError::InconsistentState(_)));

        // Nothing was deleted.
        assert_eq!(store.aliases_for_site(site.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_domain_change_is_refused_before_the_site_row_is_written() {
        let (store, sync) = setup();
        let site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();
        store
            .insert(NewAlias::non_canonical(site.id, "www.example.com"))
            .await
            .unwrap();

        // The pre-write check fails, so a caller never commits the blank row.
        let err = sync.check_domain_change(&site, "").await.unwrap_err();
        assert!(matches!(err, AliasError::InconsistentState(_)));

        // Site and aliases are untouched and resolution still works.
        assert_eq!(store.site(site.id).await.unwrap().unwrap().domain, "example.com");
        let canonical = store.canonical_for_site(site.id).await.unwrap().unwrap();
        assert_eq!(canonical.domain, "example.com");
        let resolver = HostResolver::new(store.clone());
        let hit = resolver.resolve("example.com", None).await.unwrap().unwrap();
        assert_eq!(hit.id, canonical.id);

        // There is nothing stranded for a full sweep to repair.
        assert!(sync.sync_all().await.unwrap().is_noop());
    }

    #[tokio::test]
    async fn domain_change_to_a_taken_domain_is_refused_up_front() {
        let (store, sync) = setup();
        let a = store.create_site("a.example.com", "A").unwrap();
        sync.site_created(&a).await.unwrap();
        let b = store.create_site("b.example.com", "B").unwrap();
        sync.site_created(&b).await.unwrap();

        let err = sync.check_domain_change(&b, "a.example.com").await.unwrap_err();
        match err {
            AliasError::Validation(errors) => assert!(errors.has_field("domain")),
            other => panic!("expected validation error, got {other:?}"),
        }

        // Both canonical aliases are as they were.
        assert_eq!(
            store.canonical_for_site(b.id).await.unwrap().unwrap().domain,
            "b.example.com"
        );
    }

    #[tokio::test]
    async fn check_domain_change_allows_clean_transitions() {
        let (store, sync) = setup();
        let site = store.create_site("example.com", "Example").unwrap();
        sync.site_created(&site).await.unwrap();

        // Unchanged domain, a fresh domain, and blanking a site whose only
        // alias is the canonical one are all fine.
        sync.check_domain_change(&site, "example.com").await.unwrap();
        sync.check_domain_change(&site, "example.org").await.unwrap();
        sync.check_domain_change(&site, "").await.unwrap();
    }

    #[tokio::test]
    async fn sync_all_corrects_creates_and_is_idempotent() {
        let (store, sync) = setup();

        // One site with a drifted canonical alias.
        let mut drifted = store.create_site("old.example.com", "Drifted").unwrap();
        sync.site_created(&drifted).await.unwrap();
        drifted.domain = "new.example.com".to_string();
        store.update_site(&drifted).unwrap();

        // One site missing its canonical alias entirely.
        store.create_site("fresh.example.net", "Fresh").unwrap();

        // One blank-domain site, which gets nothing.
        store.create_site("", "Blank").unwrap();

        let report = sync.sync_all().await.unwrap();
        assert_eq!(report, SyncReport { created: 1, updated: 1, deleted: 0 });

        let canonical = store.canonical_for_site(drifted.id).await.unwrap().unwrap();
        assert_eq!(canonical.domain, "new.example.com");

        // Second run changes nothing.
        let report = sync.sync_all().await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn sync_many_honors_its_filter_and_skips_missing() {
        let (store, sync) = setup();

        let mut a = store.create_site("a.example.com", "A").unwrap();
        sync.site_created(&a).await.unwrap();
        let mut b = store.create_site("b.example.com", "B").unwrap();
        sync.site_created(&b).await.unwrap();

        a.domain = "a2.example.com".to_string();
        store.update_site(&a).unwrap();
        b.domain = "b2.example.com".to_string();
        store.update_site(&b).unwrap();

        // Site without a canonical alias: sync_many must not create one.
        let orphan = store.create_site("orphan.example.com", "Orphan").unwrap();

        let report = sync.sync_many(Some(&[a.id])).await.unwrap();
        assert_eq!(report, SyncReport { created: 0, updated: 1, deleted: 0 });

        assert_eq!(
            store.canonical_for_site(a.id).await.unwrap().unwrap().domain,
            "a2.example.com"
        );
        // b was outside the filter and is still drifted.
        assert_eq!(
            store.canonical_for_site(b.id).await.unwrap().unwrap().domain,
            "b.example.com"
        );
        assert!(store.canonical_for_site(orphan.id).await.unwrap().is_none());

        // The unfiltered sweep picks b up.
        let report = sync.sync_many(None).await.unwrap();
        assert_eq!(report.updated, 1);
    }

    #[tokio::test]
    async fn at_most_one_canonical_alias_per_site_throughout() {
        let (store, sync) = setup();
        let mut site = store.create_site("example.com", "Example").unwrap();

        sync.site_created(&site).await.unwrap();
        for domain in ["example.org", "example.net", "example.com"] {
            site.domain = domain.to_string();
            let updated = store.update_site(&site).unwrap();
            sync.sync_site(&updated).await.unwrap();
            sync.sync_all().await.unwrap();

            let canonicals: Vec<_> = store
                .aliases_for_site(site.id)
                .await
                .unwrap()
                .into_iter()
                .filter(|a| a.is_canonical)
                .collect();
            assert_eq!(canonicals.len(), 1);
            assert_eq!(canonicals[0].domain, domain);
        }
    }

    #[tokio::test]
    async fn create_rename_resolve_scenario() {
        let (store, sync) = setup();
        let mut site = store.create_site("example.com", "S1").unwrap();
        sync.site_created(&site).await.unwrap();

        let aliases = store.aliases_for_site(site.id).await.unwrap();
        assert_eq!(aliases.len(), 1);
        let original_id = aliases[0].id;

        site.domain = "example.org".to_string();
        let site = store.update_site(&site).unwrap();
        sync.site_domain_changed("example.com", &site).await.unwrap();

        let aliases = store.aliases_for_site(site.id).await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].id, original_id);
        assert_eq!(aliases[0].domain, "example.org");

        let resolver = HostResolver::new(store);
        // No wildcard alias exists, so subdomains do not resolve.
        assert!(resolver.resolve("sub.example.org", None).await.unwrap().is_none());
        let alias = resolver.resolve("example.org", None).await.unwrap().unwrap();
        assert_eq!(alias.id, original_id);
    }
}
