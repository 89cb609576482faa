//! Account management handlers: CRUD, verification, import/export, and
//! quota refresh.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

use gravity_core::proxy::server::AppState;
use gravity_core::verification;
use gravity_types::models::{Account, AccountExport, AccountInput};

use super::api_error;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Account>>, (StatusCode, String)> {
    state.store.list().map(Json).map_err(api_error)
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<AccountInput>,
) -> Result<(StatusCode, Json<Account>), (StatusCode, String)> {
    if input.refresh_token.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "refresh_token is required".to_string()));
    }
    let account = state.store.create(&input).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, (StatusCode, String)> {
    state.store.get(id).map(Json).map_err(api_error)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<AccountInput>,
) -> Result<Json<Account>, (StatusCode, String)> {
    state.store.update(id, &input).map(Json).map_err(api_error)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.store.delete(id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, (StatusCode, String)> {
    verification::check_account_status(&state.store, &state.refresher, state.upstream.http(), id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn check_all(
    State(state): State<AppState>,
) -> Result<Json<Vec<Account>>, (StatusCode, String)> {
    verification::check_all_accounts(&state.store, &state.refresher, state.upstream.http())
        .await
        .map_err(api_error)?;
    state.store.list().map(Json).map_err(api_error)
}

pub async fn import(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, String)> {
    let imported = state
        .store
        .import(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(json!({"imported": imported})))
}

pub async fn export(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountExport>>, (StatusCode, String)> {
    state.store.export().map(Json).map_err(api_error)
}

/// Fetch quota from the Cloud-Code API and fold the result back into the
/// stored account: subscription tier and conservative remaining quota.
pub async fn refresh_quota(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut account = state.store.get(id).map_err(api_error)?;
    state
        .refresher
        .ensure_valid_token(&state.store, &mut account)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("token refresh failed: {e}")))?;

    let access_token = account.access_token.clone().unwrap_or_default();
    let quota = state
        .quota
        .fetch_quota(&access_token, &account.email)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("quota fetch failed: {e}")))?;

    if let Some(account_type) = quota.account_type() {
        if account_type != account.account_type {
            state
                .store
                .update_account_type(id, account_type)
                .map_err(api_error)?;
        }
    }
    if let Some(remaining) = quota.min_remaining_percentage() {
        state
            .store
            .update_quota(id, 100 - remaining.clamp(0, 100), 100, quota.earliest_reset())
            .map_err(api_error)?;
    }

    Ok(Json(serde_json::to_value(&quota).unwrap_or(Value::Null)))
}
