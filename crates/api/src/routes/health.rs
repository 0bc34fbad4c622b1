//! Health check endpoints
//!
//! The full health report includes how much the service actually has to
//! serve: site and alias counts from the database and the number of live
//! entries in the resolution cache.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// None when the database is unreachable.
    pub sites: Option<i64>,
    pub aliases: Option<i64>,
    pub cached_resolutions: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let counts: Result<(i64, i64), sqlx::Error> = async {
        let sites = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&state.pool)
            .await?;
        let aliases = sqlx::query_scalar("SELECT COUNT(*) FROM aliases")
            .fetch_one(&state.pool)
            .await?;
        Ok((sites, aliases))
    }
    .await;

    let cached_resolutions = state.resolver.cache().stats().active_entries;
    let version = env!("CARGO_PKG_VERSION");

    match counts {
        Ok((sites, aliases)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version,
                database: "healthy",
                sites: Some(sites),
                aliases: Some(aliases),
                cached_resolutions,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check cannot reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    version,
                    database: "unhealthy",
                    sites: None,
                    aliases: None,
                    cached_resolutions,
                }),
            )
        }
    }
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: ready once the database answers
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sites")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
