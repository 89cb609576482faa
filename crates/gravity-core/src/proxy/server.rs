//! Shared application state and the proxy-facing axum router.
//!
//! All process-wide components are constructed here through explicit
//! composition so tests can instantiate independent copies.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use gravity_types::models::AppConfig;

use crate::oauth::TokenRefresher;
use crate::pool::{AccountSelector, RateLimitTracker, SessionBinder};
use crate::quota::QuotaFetcher;
use crate::router::ModelRouter;
use crate::store::Store;
use crate::usage::UsageRecorder;

use super::handlers;
use super::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tracker: Arc<RateLimitTracker>,
    pub sessions: Arc<SessionBinder>,
    pub selector: Arc<AccountSelector>,
    pub router: Arc<ModelRouter>,
    pub recorder: Arc<UsageRecorder>,
    pub refresher: Arc<TokenRefresher>,
    pub upstream: Arc<UpstreamClient>,
    pub quota: Arc<QuotaFetcher>,
    pub config: Arc<tokio::sync::RwLock<AppConfig>>,
    pub config_path: Arc<PathBuf>,
}

impl AppState {
    /// Compose the production state from a loaded configuration.
    pub fn new(config: AppConfig, config_path: PathBuf, store: Arc<Store>) -> Self {
        let upstream = Arc::new(UpstreamClient::new(config.proxy.timeout));
        let refresher = Arc::new(TokenRefresher::new());
        Self::with_components(config, config_path, store, upstream, refresher)
    }

    /// Compose with injected upstream/refresher (used by tests to point at
    /// mock servers).
    pub fn with_components(
        config: AppConfig,
        config_path: PathBuf,
        store: Arc<Store>,
        upstream: Arc<UpstreamClient>,
        refresher: Arc<TokenRefresher>,
    ) -> Self {
        let tracker = Arc::new(RateLimitTracker::new());
        let sessions = Arc::new(SessionBinder::default());
        let selector = Arc::new(AccountSelector::new(
            store.clone(),
            tracker.clone(),
            sessions.clone(),
        ));
        let router = Arc::new(ModelRouter::new(&config.routes, config.proxy.light_model.clone()));
        let recorder = Arc::new(UsageRecorder::new(store.clone()));

        Self {
            store,
            tracker,
            sessions,
            selector,
            router,
            recorder,
            refresher,
            upstream,
            quota: Arc::new(QuotaFetcher::new()),
            config: Arc::new(tokio::sync::RwLock::new(config)),
            config_path: Arc::new(config_path),
        }
    }
}

/// Build the proxy router: the three inbound dialects plus model listings.
pub fn build_proxy_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::openai::handle_chat_completions))
        .route("/v1/models", get(handlers::openai::handle_list_models))
        .route("/v1/messages", post(handlers::claude::handle_messages))
        .route("/v1beta/models", get(handlers::gemini::handle_list_models))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
