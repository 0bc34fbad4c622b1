//! In-memory alias store
//!
//! Backs unit tests and local development. Enforces the same invariants as
//! the PostgreSQL store, serialized behind a mutex instead of transactions
//! and unique indexes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use sitewarden_shared::{is_valid_alias_domain, Alias, AliasError, NewAlias, Site, ValidationErrors};

use super::AliasStore;

#[derive(Default)]
struct Inner {
    sites: BTreeMap<i64, Site>,
    aliases: BTreeMap<i64, Alias>,
    next_site_id: i64,
    next_alias_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryAliasStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, AliasError> {
        self.inner
            .lock()
            .map_err(|_| AliasError::Database("alias store mutex poisoned".to_string()))
    }

    /// Create a site record. Does not run synchronization; pair with the
    /// synchronizer's `site_created` the way the route layer does.
    pub fn create_site(&self, domain: &str, name: &str) -> Result<Site, AliasError> {
        let mut inner = self.lock()?;
        inner.next_site_id += 1;
        let now = OffsetDateTime::now_utc();
        let site = Site {
            id: inner.next_site_id,
            domain: domain.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.sites.insert(site.id, site.clone());
        Ok(site)
    }

    /// Overwrite a site record, returning the stored copy.
    pub fn update_site(&self, site: &Site) -> Result<Site, AliasError> {
        let mut inner = self.lock()?;
        if !inner.sites.contains_key(&site.id) {
            return Err(AliasError::InconsistentState(format!(
                "site {} does not exist",
                site.id
            )));
        }
        let mut stored = site.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        inner.sites.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Remove a site and, like the foreign key cascade, its aliases.
    pub fn remove_site(&self, id: i64) -> Result<bool, AliasError> {
        let mut inner = self.lock()?;
        let existed = inner.sites.remove(&id).is_some();
        inner.aliases.retain(|_, a| a.site_id != id);
        Ok(existed)
    }

    fn validate(
        inner: &Inner,
        domain: &str,
        site_id: i64,
        is_canonical: bool,
        exclude_id: Option<i64>,
    ) -> Result<(), AliasError> {
        let mut errors = ValidationErrors::default();

        if !is_valid_alias_domain(domain) {
            errors.push("domain", domain, "must be 'hostname' or 'hostname:port'");
        }

        match inner.sites.get(&site_id) {
            None => errors.push("site_id", site_id.to_string(), "site does not exist"),
            Some(site) if is_canonical && site.domain != domain => {
                errors.push(
                    "domain",
                    domain,
                    format!("canonical alias must match site domain {:?}", site.domain),
                );
            }
            Some(_) => {}
        }

        if is_canonical {
            let other = inner
                .aliases
                .values()
                .any(|a| a.site_id == site_id && a.is_canonical && Some(a.id) != exclude_id);
            if other {
                errors.push("is_canonical", "true", "site already has a canonical alias");
            }
        }

        let duplicate = inner
            .aliases
            .values()
            .any(|a| a.domain.eq_ignore_ascii_case(domain) && Some(a.id) != exclude_id);
        if duplicate {
            errors.push("domain", domain, "already in use");
        }

        errors.into_result()
    }
}

impl AliasStore for MemoryAliasStore {
    async fn find_by_domains(&self, domains: &[String]) -> Result<HashMap<String, Alias>, AliasError> {
        let inner = self.lock()?;
        let mut found = HashMap::new();
        for alias in inner.aliases.values() {
            let key = alias.domain.to_lowercase();
            if domains.iter().any(|d| d.to_lowercase() == key) {
                found.insert(key, alias.clone());
            }
        }
        Ok(found)
    }

    async fn get(&self, id: i64) -> Result<Option<Alias>, AliasError> {
        Ok(self.lock()?.aliases.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Alias>, AliasError> {
        let inner = self.lock()?;
        let mut aliases: Vec<Alias> = inner.aliases.values().cloned().collect();
        aliases.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(aliases)
    }

    async fn aliases_for_site(&self, site_id: i64) -> Result<Vec<Alias>, AliasError> {
        let inner = self.lock()?;
        Ok(inner
            .aliases
            .values()
            .filter(|a| a.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn canonical_for_site(&self, site_id: i64) -> Result<Option<Alias>, AliasError> {
        let inner = self.lock()?;
        Ok(inner
            .aliases
            .values()
            .find(|a| a.site_id == site_id && a.is_canonical)
            .cloned())
    }

    async fn canonical_aliases(&self) -> Result<Vec<Alias>, AliasError> {
        let inner = self.lock()?;
        Ok(inner.aliases.values().filter(|a| a.is_canonical).cloned().collect())
    }

    async fn insert(&self, alias: NewAlias) -> Result<Alias, AliasError> {
        let mut inner = self.lock()?;
        Self::validate(&inner, &alias.domain, alias.site_id, alias.is_canonical, None)?;

        inner.next_alias_id += 1;
        let now = OffsetDateTime::now_utc();
        let stored = Alias {
            id: inner.next_alias_id,
            domain: alias.domain,
            site_id: alias.site_id,
            is_canonical: alias.is_canonical,
            redirect_to_canonical: alias.redirect_to_canonical,
            created_at: now,
            updated_at: now,
        };
        inner.aliases.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, alias: &Alias) -> Result<Alias, AliasError> {
        let mut inner = self.lock()?;
        if !inner.aliases.contains_key(&alias.id) {
            return Err(AliasError::InconsistentState(format!(
                "alias {} disappeared during update",
                alias.id
            )));
        }
        Self::validate(&inner, &alias.domain, alias.site_id, alias.is_canonical, Some(alias.id))?;

        let mut stored = alias.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        inner.aliases.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<bool, AliasError> {
        Ok(self.lock()?.aliases.remove(&id).is_some())
    }

    async fn site(&self, id: i64) -> Result<Option<Site>, AliasError> {
        Ok(self.lock()?.sites.get(&id).cloned())
    }

    async fn sites_missing_canonical(&self) -> Result<Vec<Site>, AliasError> {
        let inner = self.lock()?;
        Ok(inner
            .sites
            .values()
            .filter(|s| {
                !s.domain.is_empty()
                    && !inner
                        .aliases
                        .values()
                        .any(|a| a.site_id == s.id && a.is_canonical)
            })
            .cloned()
            .collect())
    }
}
