//! Management REST API: thin wrappers around the core operations.

mod accounts;
mod config;
mod routes;
mod stats;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use gravity_core::proxy::server::AppState;
use gravity_core::AppError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(stats::dashboard))
        .route("/accounts", get(accounts::list).post(accounts::create))
        .route("/accounts/import", post(accounts::import))
        .route("/accounts/export", get(accounts::export))
        .route("/accounts/check-all", post(accounts::check_all))
        .route(
            "/accounts/:id",
            get(accounts::get).put(accounts::update).delete(accounts::delete),
        )
        .route("/accounts/:id/check", post(accounts::check))
        .route("/accounts/:id/quota", post(accounts::refresh_quota))
        .route("/routes", get(routes::get_routes).put(routes::update_routes))
        .route("/stats", get(stats::overall))
        .route("/stats/models", get(stats::models))
        .route("/stats/accounts", get(stats::accounts))
        .route("/stats/hourly", get(stats::hourly))
        .route("/logs", get(stats::logs))
        .route("/config", get(config::get_config).put(config::update_config))
}

/// Map a core error onto a management-API status + message.
pub(crate) fn api_error(e: AppError) -> (StatusCode, String) {
    match e {
        AppError::NotFound => (StatusCode::NOT_FOUND, "account not found".to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// Liveness plus a coarse pool summary.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let total = state.store.list().map(|a| a.len()).unwrap_or(0);
    let active = state.store.count_active().unwrap_or(0);

    let status = if total == 0 {
        "no_accounts"
    } else if active == 0 {
        "degraded"
    } else {
        "healthy"
    };

    Json(json!({
        "status": status,
        "total_accounts": total,
        "active_accounts": active,
    }))
}
