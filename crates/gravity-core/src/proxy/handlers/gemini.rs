//! Gemini-native endpoint: `/v1beta/models`.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Advertised models in the Gemini-native listing shape.
pub async fn handle_list_models() -> Response {
    let entries: &[(&str, &str, &str)] = &[
        (
            "gemini-3-pro-high",
            "Gemini 3 Pro High",
            "Most capable Gemini 3 model for complex reasoning",
        ),
        ("gemini-3-pro", "Gemini 3 Pro", "Balanced Gemini 3 model for general tasks"),
        ("gemini-3-flash", "Gemini 3 Flash", "Fast Gemini 3 model for quick responses"),
        ("gemini-2.5-pro", "Gemini 2.5 Pro", "Advanced Gemini 2.5 model"),
        ("gemini-2.5-flash", "Gemini 2.5 Flash", "Fast Gemini 2.5 model"),
        ("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite", "Lightweight Gemini 2.5 model"),
        ("gemini-2.0-flash", "Gemini 2.0 Flash", "Fast Gemini 2.0 model"),
        ("gemini-2.0-pro", "Gemini 2.0 Pro", "Advanced Gemini 2.0 model"),
        ("gemini-1.5-flash", "Gemini 1.5 Flash", "Legacy fast model"),
        ("gemini-1.5-pro", "Gemini 1.5 Pro", "Legacy advanced model"),
    ];

    let models: Vec<Value> = entries
        .iter()
        .map(|(id, display_name, description)| {
            json!({
                "name": format!("models/{id}"),
                "displayName": display_name,
                "description": description,
                "supportedGenerationMethods": ["generateContent", "countTokens"],
            })
        })
        .collect();
    Json(json!({"models": models})).into_response()
}
