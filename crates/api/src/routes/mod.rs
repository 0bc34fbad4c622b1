//! API routes

pub mod aliases;
pub mod health;
pub mod sites;

use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::{
    routing::{resolve_site, ResolvedSite},
    site_context,
    state::AppState,
};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Management API, addressed directly rather than by tenant host
    let admin_api = Router::new()
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route(
            "/sites/:id",
            get(sites::get_site)
                .patch(sites::update_site)
                .delete(sites::delete_site),
        )
        .route(
            "/aliases",
            get(aliases::list_aliases).post(aliases::create_alias),
        )
        .route(
            "/aliases/:id",
            get(aliases::get_alias)
                .patch(aliases::update_alias)
                .delete(aliases::delete_alias),
        )
        .route("/sync", post(sites::run_sync))
        .route("/resolve", get(aliases::resolve_host));

    // Tenant-facing routes: host resolution runs in front of these
    let tenant_routes = Router::new()
        .route("/", get(whoami))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_site,
        ));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", admin_api)
        .merge(tenant_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Report which site the request's host resolved to
async fn whoami(Extension(resolved): Extension<ResolvedSite>) -> Json<Value> {
    // Both come from the resolution middleware and must agree.
    Json(json!({
        "site_id": resolved.site_id(),
        "current_site_id": site_context::current_site_id().ok(),
        "alias": resolved.alias,
    }))
}
