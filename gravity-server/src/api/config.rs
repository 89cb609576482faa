//! Configuration handlers. Updates merge field-by-field so partial bodies
//! leave the rest of the configuration untouched; some changes (port,
//! host, upstream timeout) only take effect after a restart.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use gravity_core::proxy::server::AppState;
use gravity_types::models::AppConfig;

pub async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json(state.config.read().await.clone())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    server: ServerUpdate,
    proxy: ProxyUpdate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerUpdate {
    port: Option<u16>,
    host: Option<String>,
    log_level: Option<String>,
    api_key: Option<String>,
    auth_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProxyUpdate {
    timeout: Option<u64>,
    max_retries: Option<u32>,
    auto_rotate: Option<bool>,
    stream_enabled: Option<bool>,
    light_model: Option<String>,
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut config = state.config.write().await;

    if let Some(port) = update.server.port.filter(|p| *p > 0) {
        config.server.port = port;
    }
    if let Some(host) = update.server.host.filter(|h| !h.is_empty()) {
        config.server.host = host;
    }
    if let Some(log_level) = update.server.log_level.filter(|l| !l.is_empty()) {
        config.server.log_level = log_level;
    }
    if let Some(api_key) = update.server.api_key.filter(|k| !k.is_empty()) {
        config.server.api_key = api_key;
    }
    if let Some(auth_enabled) = update.server.auth_enabled {
        config.server.auth_enabled = auth_enabled;
    }

    if let Some(timeout) = update.proxy.timeout.filter(|t| *t > 0) {
        config.proxy.timeout = timeout;
    }
    if let Some(max_retries) = update.proxy.max_retries.filter(|r| *r > 0) {
        config.proxy.max_retries = max_retries;
    }
    if let Some(auto_rotate) = update.proxy.auto_rotate {
        config.proxy.auto_rotate = auto_rotate;
    }
    if let Some(stream_enabled) = update.proxy.stream_enabled {
        config.proxy.stream_enabled = stream_enabled;
    }
    if let Some(light_model) = update.proxy.light_model.filter(|m| !m.is_empty()) {
        config.proxy.light_model = light_model;
    }

    if let Err(e) = gravity_core::config::save(&state.config_path, &config) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to save config: {e}"),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Configuration saved. Some changes require restart to take effect.",
        "config": &*config,
    })))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use gravity_core::oauth::TokenRefresher;
    use gravity_core::proxy::upstream::UpstreamClient;
    use gravity_core::Store;

    use super::*;

    #[tokio::test]
    async fn test_partial_update_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::with_components(
            AppConfig::default(),
            dir.path().join("config.yaml"),
            Arc::new(Store::open_in_memory().unwrap()),
            Arc::new(UpstreamClient::with_base_url("http://127.0.0.1:1", 5)),
            Arc::new(TokenRefresher::with_token_url("http://127.0.0.1:1/token")),
        );

        let update: ConfigUpdate =
            serde_json::from_str(r#"{"proxy":{"max_retries":5,"auto_rotate":false}}"#).unwrap();
        update_config(State(state.clone()), Json(update)).await.unwrap();

        let config = state.config.read().await;
        assert_eq!(config.proxy.max_retries, 5);
        assert!(!config.proxy.auto_rotate);
        // Untouched fields keep their values.
        assert_eq!(config.proxy.timeout, 120);
        assert_eq!(config.server.port, 8045);
    }
}
