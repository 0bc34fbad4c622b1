//! Site management routes
//!
//! Site writes are where the canonical synchronizer hooks fire: creating a
//! site with a domain provisions its canonical alias, changing the domain
//! rewrites it, and clearing the domain removes it (or refuses, if other
//! aliases still reference the site).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use sitewarden_shared::Site;

use crate::{error::ApiError, state::AppState, sync::SyncReport};

const SITE_COLUMNS: &str = "id, domain, name, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSiteRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
}

/// List all sites
pub async fn list_sites(State(state): State<AppState>) -> Result<Json<Vec<Site>>, ApiError> {
    let sites: Vec<Site> =
        sqlx::query_as(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY id"))
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(sites))
}

/// Create a site; a non-blank domain gets a canonical alias immediately
pub async fn create_site(
    State(state): State<AppState>,
    Json(req): Json<CreateSiteRequest>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    let site: Site = sqlx::query_as(&format!(
        "INSERT INTO sites (domain, name) VALUES ($1, $2) RETURNING {SITE_COLUMNS}"
    ))
    .bind(req.domain.trim())
    .bind(&req.name)
    .fetch_one(&state.pool)
    .await?;

    state.synchronizer().site_created(&site).await?;
    tracing::info!(site_id = site.id, domain = %site.domain, "site created");

    Ok((StatusCode::CREATED, Json(site)))
}

/// Get a site by id
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Site>, ApiError> {
    let site: Option<Site> =
        sqlx::query_as(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    site.map(Json).ok_or(ApiError::NotFound)
}

/// Update a site; a domain change resynchronizes its canonical alias
pub async fn update_site(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<Json<Site>, ApiError> {
    let existing: Option<Site> =
        sqlx::query_as(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let existing = existing.ok_or(ApiError::NotFound)?;

    let domain = req
        .domain
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.domain)
        .to_string();
    let name = req.name.unwrap_or_else(|| existing.name.clone());

    // Refuse the change before the site row is written: a post-commit sync
    // failure would otherwise strand the site with a stale canonical alias
    // that no later sweep repairs.
    state
        .synchronizer()
        .check_domain_change(&existing, &domain)
        .await?;

    let site: Site = sqlx::query_as(&format!(
        "UPDATE sites SET domain = $2, name = $3, updated_at = NOW()
         WHERE id = $1 RETURNING {SITE_COLUMNS}"
    ))
    .bind(id)
    .bind(&domain)
    .bind(&name)
    .fetch_one(&state.pool)
    .await?;

    state
        .synchronizer()
        .site_domain_changed(&existing.domain, &site)
        .await?;

    if existing.domain != site.domain {
        state.resolver.invalidate_site(site.id);
        state.resolver.invalidate_host(&existing.domain);
        tracing::info!(
            site_id = site.id,
            old = %existing.domain,
            new = %site.domain,
            "site domain changed"
        );
    }

    Ok(Json(site))
}

/// Delete a site; its aliases go with it
pub async fn delete_site(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM sites WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    state.resolver.invalidate_site(id);
    tracing::info!(site_id = id, "site deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Run a full canonical-alias resynchronization
pub async fn run_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let report = state.synchronizer().sync_all().await?;
    if !report.is_noop() {
        // Rewritten alias domains invalidate any cached resolution.
        state.resolver.cache().clear();
        tracing::info!(?report, "canonical aliases resynchronized");
    }
    Ok(Json(report))
}
