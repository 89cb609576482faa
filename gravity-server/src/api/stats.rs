//! Usage statistics and dashboard handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use gravity_core::proxy::server::AppState;
use gravity_types::models::{
    AccountStats, AccountStatus, HourlyStat, ModelStats, RequestLogEntry, UsageStats,
};

use super::api_error;

pub async fn overall(
    State(state): State<AppState>,
) -> Result<Json<UsageStats>, (StatusCode, String)> {
    state.recorder.overall().map(Json).map_err(api_error)
}

pub async fn models(
    State(state): State<AppState>,
) -> Result<Json<Vec<ModelStats>>, (StatusCode, String)> {
    state.recorder.models().map(Json).map_err(api_error)
}

pub async fn accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountStats>>, (StatusCode, String)> {
    state.recorder.accounts().map(Json).map_err(api_error)
}

pub async fn hourly(
    State(state): State<AppState>,
) -> Result<Json<Vec<HourlyStat>>, (StatusCode, String)> {
    state.recorder.hourly().map(Json).map_err(api_error)
}

#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<usize>,
}

pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<RequestLogEntry>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(50);
    state.recorder.recent(limit).map(Json).map_err(api_error)
}

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let all = state.store.list().map_err(api_error)?;
    let active = all.iter().filter(|a| a.status == AccountStatus::Active).count();
    let stats = state.recorder.overall().map_err(api_error)?;
    let model_stats = state.recorder.models().map_err(api_error)?;
    let hourly_stats = state.recorder.hourly().map_err(api_error)?;

    Ok(Json(json!({
        "accounts": {"total": all.len(), "active": active},
        "stats": stats,
        "model_stats": model_stats,
        "hourly_stats": hourly_stats,
    })))
}
