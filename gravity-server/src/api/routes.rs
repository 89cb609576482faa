//! Model-route management handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use gravity_core::proxy::server::AppState;
use gravity_types::models::RouteRule;

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteRule>> {
    Json(state.router.routes())
}

/// Replace the route table. The new rules take effect immediately and are
/// persisted into the configuration file.
pub async fn update_routes(
    State(state): State<AppState>,
    Json(rules): Json<Vec<RouteRule>>,
) -> Result<Json<Vec<RouteRule>>, (StatusCode, String)> {
    state.router.set_routes(&rules);

    let mut config = state.config.write().await;
    config.routes = rules;
    if let Err(e) = gravity_core::config::save(&state.config_path, &config) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to save config: {e}"),
        ));
    }

    Ok(Json(state.router.routes()))
}
