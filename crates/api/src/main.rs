//! Sitewarden API server entrypoint

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sitewarden_api::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sitewarden_api=info,sitewarden_shared=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let pool = sitewarden_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("connecting to database")?;
    sitewarden_shared::run_migrations(&pool)
        .await
        .context("running migrations")?;

    let state = AppState::new(pool, config);

    // Alias storage exists now: bring canonical aliases in line with sites.
    let report = state
        .synchronizer()
        .storage_ready()
        .await
        .context("initial canonical alias sync")?;
    if !report.is_noop() {
        tracing::info!(?report, "canonical aliases synchronized at startup");
    }

    let app = routes::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.bind_address)
        .await
        .with_context(|| format!("binding {}", state.config.bind_address))?;
    tracing::info!("listening on {}", state.config.bind_address);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
