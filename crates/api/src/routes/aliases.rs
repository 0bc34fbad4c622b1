//! Alias management routes
//!
//! All writes go through the alias store so the uniqueness and canonical
//! invariants are re-validated on every change. Canonical aliases are
//! managed by the synchronizer; handlers here mostly deal in the extra,
//! non-canonical bindings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use sitewarden_shared::{Alias, NewAlias};

use crate::{error::ApiError, state::AppState, store::AliasStore};

#[derive(Debug, Deserialize)]
pub struct CreateAliasRequest {
    pub domain: String,
    pub site_id: i64,
    #[serde(default)]
    pub is_canonical: bool,
    #[serde(default = "default_true")]
    pub redirect_to_canonical: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateAliasRequest {
    pub domain: Option<String>,
    pub redirect_to_canonical: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub host: String,
    pub port: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub alias: Option<Alias>,
}

/// List all aliases
pub async fn list_aliases(State(state): State<AppState>) -> Result<Json<Vec<Alias>>, ApiError> {
    Ok(Json(state.store().list().await?))
}

/// Create an alias
pub async fn create_alias(
    State(state): State<AppState>,
    Json(req): Json<CreateAliasRequest>,
) -> Result<(StatusCode, Json<Alias>), ApiError> {
    let alias = state
        .store()
        .insert(NewAlias {
            domain: req.domain.trim().to_string(),
            site_id: req.site_id,
            is_canonical: req.is_canonical,
            redirect_to_canonical: req.redirect_to_canonical,
        })
        .await?;

    // A fresh alias may shadow cached misses for its host.
    state.resolver.invalidate_host(alias.host());
    tracing::info!(alias_id = alias.id, domain = %alias.domain, "alias created");

    Ok((StatusCode::CREATED, Json(alias)))
}

/// Get an alias by id
pub async fn get_alias(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Alias>, ApiError> {
    state.store().get(id).await?.map(Json).ok_or(ApiError::NotFound)
}

/// Update an alias's domain or redirect flag
pub async fn update_alias(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAliasRequest>,
) -> Result<Json<Alias>, ApiError> {
    let mut alias = state.store().get(id).await?.ok_or(ApiError::NotFound)?;
    let old_host = alias.host().to_string();

    if let Some(domain) = req.domain {
        alias.domain = domain.trim().to_string();
    }
    if let Some(redirect) = req.redirect_to_canonical {
        alias.redirect_to_canonical = redirect;
    }

    let alias = state.store().update(&alias).await?;

    state.resolver.invalidate_host(&old_host);
    state.resolver.invalidate_host(alias.host());
    state.resolver.invalidate_site(alias.site_id);

    Ok(Json(alias))
}

/// Delete an alias
pub async fn delete_alias(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let alias = state.store().get(id).await?.ok_or(ApiError::NotFound)?;

    if !state.store().delete(id).await? {
        return Err(ApiError::NotFound);
    }

    state.resolver.invalidate_host(alias.host());
    state.resolver.invalidate_site(alias.site_id);
    tracing::info!(alias_id = id, domain = %alias.domain, "alias deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Resolve a host (and optional port) without going through the middleware.
/// Absence of a match is a 200 with a null alias, not an error.
pub async fn resolve_host(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let alias = state
        .resolver
        .resolve(&query.host, query.port.as_deref())
        .await?;
    Ok(Json(ResolveResponse { alias }))
}
