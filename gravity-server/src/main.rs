//! Gravity Gateway daemon.
//!
//! Serves the LLM proxy endpoints on `/v1/*` and `/v1beta/*`, and the
//! management REST API on `/api/*`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gravity_core::proxy::server::{build_proxy_router, AppState};
use gravity_core::proxy::sweeper;
use gravity_core::Store;
use gravity_types::models::AppConfig;

mod api;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = gravity_core::config::resolve_config_path();
    let config = match gravity_core::config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: could not load config: {e}, using defaults");
            AppConfig::default()
        }
    };

    let level: Level = config.server.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db_path = resolve_db_path(&config.storage.db_path);
    let store = Arc::new(Store::open(&db_path)?);
    info!("storage ready at {}", db_path.display());

    let state = AppState::new(config.clone(), config_path, store);
    let _sweeper = sweeper::spawn(state.tracker.clone(), state.sessions.clone());

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("gravity gateway listening on http://{}", addr);
    info!("OpenAI API:     http://{}/v1/chat/completions", addr);
    info!("Anthropic API:  http://{}/v1/messages", addr);
    info!("management API: http://{}/api/", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let management = Router::new()
        .nest("/api", api::router())
        .route("/health", get(api::health))
        .with_state(state.clone());

    build_proxy_router(state)
        .merge(management)
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Relative database paths resolve next to the executable so the daemon
/// behaves the same regardless of the working directory it is started from.
fn resolve_db_path(configured: &str) -> PathBuf {
    let path = PathBuf::from(configured);
    if path.is_absolute() {
        return path;
    }
    match std::env::current_exe() {
        Ok(exe) => exe.parent().map(|dir| dir.join(&path)).unwrap_or(path),
        Err(e) => {
            warn!("could not resolve executable path: {e}, using {configured} as-is");
            path
        }
    }
}
