use std::time::Duration;

use anyhow::Context;
use api::{AppState, Settings};
use axum::http::{header, HeaderValue, Method};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

/// How often expired sessions and OAuth states are swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info")),
        )
        .init();

    let settings = Settings::new().context("failed to load settings")?;
    if !settings.google_enabled() {
        tracing::warn!("Google sign-in disabled: GOOGLE_ID or GOOGLE_SECRET not set");
    }

    let pool = api::db::connect(&settings.database)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("../api/migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let session_store = PostgresStore::new(pool.clone());
    session_store
        .migrate()
        .await
        .context("failed to migrate session store")?;

    tokio::spawn(purge_expired(pool.clone(), session_store.clone()));

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(settings.auth.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(7)));

    let cors = cors_layer(&settings.server.client)?;
    let addr = settings.server.addr();

    let router = api::app(AppState::new(pool, settings)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(session_layer),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Browser clients send the session cookie, so the origin must be explicit.
fn cors_layer(client: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = client
        .trim_end_matches('/')
        .parse()
        .with_context(|| format!("invalid client origin: {client}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

async fn purge_expired(pool: PgPool, sessions: PostgresStore) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match api::db::purge_expired_oauth_states(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(removed = n, "expired OAuth states purged"),
            Err(e) => tracing::warn!("Failed to purge OAuth states: {}", e),
        }
        if let Err(e) = sessions.delete_expired().await {
            tracing::warn!("Failed to purge expired sessions: {}", e);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
