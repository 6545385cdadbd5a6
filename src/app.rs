/*
 * Responsibility
 * - Config -> dependencies -> Router
 * - Cache backend choice: Valkey when REDIS_URL is set, in-process otherwise
 * - HTTP middleware applied outermost, then axum::serve()
 */
use std::{panic, process, sync::Arc};

use axum::{Router, routing::get};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::{Config, HttpSettings};
use crate::error::AppError;
use crate::middleware;
use crate::services::cache::{MemoryCache, ValkeyClient};
use crate::services::session::{CacheSessionStore, InMemorySessionStore};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,tokengate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: crash loudly; production: default hook, keep serving
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    info!(
        "starting tokengate in {:?} mode on {}",
        config.app_env, config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config.http);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, addr = %config.addr, "bind failed");
            AppError::Internal
        })?;
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!(error = %e, "server stopped");
        AppError::Internal
    })?;

    Ok(())
}

pub async fn build_state(config: &Config) -> Result<AppState, AppError> {
    match &config.redis_url {
        Some(url) => {
            let cache = ValkeyClient::new(url).await?;
            let sessions = Arc::new(CacheSessionStore::new(cache.clone()));
            AppState::with_cache(config.auth.clone(), config.session.clone(), cache, sessions)
        }
        None => {
            warn!("REDIS_URL not set; blocklist and sessions are process-local");
            AppState::with_cache(
                config.auth.clone(),
                config.session.clone(),
                MemoryCache::new(),
                Arc::new(InMemorySessionStore::default()),
            )
        }
    }
}

pub fn build_router(state: AppState, http: &HttpSettings) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router, http)
}
