//! PostgreSQL-backed alias store
//!
//! Validation queries and the row write run in one transaction, so a write
//! either lands with all invariants re-checked or not at all. The unique
//! indexes on `LOWER(domain)` and `(site_id) WHERE is_canonical` catch
//! whatever a racing writer slips past the checks, surfacing as a conflict.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};

use sitewarden_shared::{is_valid_alias_domain, Alias, AliasError, NewAlias, Site, ValidationErrors};

use super::AliasStore;

#[derive(Clone)]
pub struct PgAliasStore {
    pool: PgPool,
}

impl PgAliasStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-check the alias invariants inside the write transaction.
    ///
    /// Generic field checks run first, the case-insensitive domain
    /// uniqueness check last, and everything is aggregated so callers see
    /// all violations at once.
    async fn validate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        domain: &str,
        site_id: i64,
        is_canonical: bool,
        exclude_id: Option<i64>,
    ) -> Result<(), AliasError> {
        let mut errors = ValidationErrors::default();

        if !is_valid_alias_domain(domain) {
            errors.push("domain", domain, "must be 'hostname' or 'hostname:port'");
        }

        let site_domain: Option<String> = sqlx::query_scalar("SELECT domain FROM sites WHERE id = $1")
            .bind(site_id)
            .fetch_optional(&mut **tx)
            .await?;

        match site_domain {
            None => errors.push("site_id", site_id.to_string(), "site does not exist"),
            Some(site_domain) if is_canonical && site_domain != domain => {
                errors.push(
                    "domain",
                    domain,
                    format!("canonical alias must match site domain {site_domain:?}"),
                );
            }
            Some(_) => {}
        }

        if is_canonical {
            let other: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM aliases WHERE site_id = $1 AND is_canonical AND id IS DISTINCT FROM $2",
            )
            .bind(site_id)
            .bind(exclude_id)
            .fetch_optional(&mut **tx)
            .await?;

            if other.is_some() {
                errors.push("is_canonical", "true", "site already has a canonical alias");
            }
        }

        let duplicate: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM aliases WHERE LOWER(domain) = LOWER($1) AND id IS DISTINCT FROM $2",
        )
        .bind(domain)
        .bind(exclude_id)
        .fetch_optional(&mut **tx)
        .await?;

        if duplicate.is_some() {
            errors.push("domain", domain, "already in use");
        }

        errors.into_result()
    }
}

const ALIAS_COLUMNS: &str = "id, domain, site_id, is_canonical, redirect_to_canonical, created_at, updated_at";

impl AliasStore for PgAliasStore {
    async fn find_by_domains(&self, domains: &[String]) -> Result<HashMap<String, Alias>, AliasError> {
        if domains.is_empty() {
            return Ok(HashMap::new());
        }
        let lowered: Vec<String> = domains.iter().map(|d| d.to_lowercase()).collect();

        let rows: Vec<Alias> = sqlx::query_as(&format!(
            "SELECT {ALIAS_COLUMNS} FROM aliases WHERE LOWER(domain) = ANY($1)"
        ))
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|a| (a.domain.to_lowercase(), a)).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Alias>, AliasError> {
        let row: Option<Alias> =
            sqlx::query_as(&format!("SELECT {ALIAS_COLUMNS} FROM aliases WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Alias>, AliasError> {
        let rows: Vec<Alias> =
            sqlx::query_as(&format!("SELECT {ALIAS_COLUMNS} FROM aliases ORDER BY domain"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn aliases_for_site(&self, site_id: i64) -> Result<Vec<Alias>, AliasError> {
        let rows: Vec<Alias> = sqlx::query_as(&format!(
            "SELECT {ALIAS_COLUMNS} FROM aliases WHERE site_id = $1 ORDER BY id"
        ))
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn canonical_for_site(&self, site_id: i64) -> Result<Option<Alias>, AliasError> {
        let row: Option<Alias> = sqlx::query_as(&format!(
            "SELECT {ALIAS_COLUMNS} FROM aliases WHERE site_id = $1 AND is_canonical"
        ))
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn canonical_aliases(&self) -> Result<Vec<Alias>, AliasError> {
        let rows: Vec<Alias> = sqlx::query_as(&format!(
            "SELECT {ALIAS_COLUMNS} FROM aliases WHERE is_canonical ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, alias: NewAlias) -> Result<Alias, AliasError> {
        let mut tx = self.pool.begin().await?;
        self.validate(&mut tx, &alias.domain, alias.site_id, alias.is_canonical, None)
            .await?;

        let row: Alias = sqlx::query_as(&format!(
            "INSERT INTO aliases (domain, site_id, is_canonical, redirect_to_canonical)
             VALUES ($1, $2, $3, $4)
             RETURNING {ALIAS_COLUMNS}"
        ))
        .bind(&alias.domain)
        .bind(alias.site_id)
        .bind(alias.is_canonical)
        .bind(alias.redirect_to_canonical)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn update(&self, alias: &Alias) -> Result<Alias, AliasError> {
        let mut tx = self.pool.begin().await?;
        self.validate(&mut tx, &alias.domain, alias.site_id, alias.is_canonical, Some(alias.id))
            .await?;

        let row: Option<Alias> = sqlx::query_as(&format!(
            "UPDATE aliases
             SET domain = $2, site_id = $3, is_canonical = $4, redirect_to_canonical = $5,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {ALIAS_COLUMNS}"
        ))
        .bind(alias.id)
        .bind(&alias.domain)
        .bind(alias.site_id)
        .bind(alias.is_canonical)
        .bind(alias.redirect_to_canonical)
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or_else(|| {
            AliasError::InconsistentState(format!("alias {} disappeared during update", alias.id))
        })?;

        tx.commit().await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, AliasError> {
        let result = sqlx::query("DELETE FROM aliases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn site(&self, id: i64) -> Result<Option<Site>, AliasError> {
        let row: Option<Site> =
            sqlx::query_as("SELECT id, domain, name, created_at, updated_at FROM sites WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn sites_missing_canonical(&self) -> Result<Vec<Site>, AliasError> {
        let rows: Vec<Site> = sqlx::query_as(
            "SELECT s.id, s.domain, s.name, s.created_at, s.updated_at
             FROM sites s
             WHERE s.domain <> ''
               AND NOT EXISTS (
                   SELECT 1 FROM aliases a WHERE a.site_id = s.id AND a.is_canonical
               )
             ORDER BY s.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
