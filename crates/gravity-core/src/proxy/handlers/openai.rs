//! OpenAI-dialect endpoints: `/v1/chat/completions` and `/v1/models`.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use gravity_types::protocol::gemini::GenerateContentResponse;
use gravity_types::protocol::openai::ChatCompletionRequest;

use crate::pool::{first_user_text, session_id_for};
use crate::proxy::mappers::openai::{create_openai_sse_stream, to_chat_completion};
use crate::proxy::mappers::build_gemini_request;
use crate::proxy::server::AppState;

use super::{
    dispatch_with_rotation, openai_error, sse_response, upstream_status, DispatchError,
};

fn dispatch_error_response(error: DispatchError) -> Response {
    match error {
        DispatchError::NoAccounts => openai_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            "no available accounts",
        ),
        DispatchError::Auth(e) => openai_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "authentication_error",
            &e.to_string(),
        ),
        DispatchError::Upstream { status, body } => {
            openai_error(upstream_status(status), "api_error", &body)
        }
    }
}

pub async fn handle_chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return openai_error(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                &e.to_string(),
            )
        }
    };

    let mut model = state.router.route(&request.model);
    if state.router.is_background(&request.messages) {
        model = state.router.light_model().to_string();
    }
    let session_id = session_id_for(&first_user_text(&request.messages));
    let gemini_body =
        build_gemini_request(&request.messages, None, request.temperature, request.max_tokens);
    let stream = request.stream && state.config.read().await.proxy.stream_enabled;

    let start = Instant::now();
    let dispatched =
        match dispatch_with_rotation(&state, &gemini_body, &model, &session_id, stream).await {
            Ok(dispatched) => dispatched,
            Err(e) => return dispatch_error_response(e),
        };

    if stream {
        let recorder = state.recorder.clone();
        let account_id = dispatched.account.id;
        let log_model = model.clone();
        let sse = create_openai_sse_stream(
            dispatched.response.bytes_stream(),
            model,
            move |usage| {
                recorder.log(
                    account_id,
                    &log_model,
                    usage.tokens_in as i64,
                    usage.tokens_out as i64,
                    start.elapsed().as_millis() as i64,
                    200,
                );
            },
        );
        return sse_response(sse);
    }

    let bytes = match dispatched.response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return openai_error(
                StatusCode::BAD_GATEWAY,
                "api_error",
                &format!("failed to read upstream response: {e}"),
            )
        }
    };
    let gemini: GenerateContentResponse = match serde_json::from_slice(&bytes) {
        Ok(gemini) => gemini,
        Err(e) => {
            return openai_error(
                StatusCode::BAD_GATEWAY,
                "api_error",
                &format!("failed to decode upstream response: {e}"),
            )
        }
    };

    let completion = to_chat_completion(&gemini, &model);
    state.recorder.log(
        dispatched.account.id,
        &model,
        completion.usage.prompt_tokens as i64,
        completion.usage.completion_tokens as i64,
        start.elapsed().as_millis() as i64,
        200,
    );

    (StatusCode::OK, Json(completion)).into_response()
}

/// Static list of advertised model aliases.
pub async fn handle_list_models() -> Response {
    let entries: &[(&str, &str)] = &[
        ("gemini-3-pro-high", "google"),
        ("gemini-3-pro", "google"),
        ("gemini-3-flash", "google"),
        ("gemini-2.5-pro", "google"),
        ("gemini-2.5-flash", "google"),
        ("gemini-2.5-flash-lite", "google"),
        ("gemini-2.0-flash", "google"),
        ("gemini-2.0-flash-lite", "google"),
        ("gemini-2.0-pro", "google"),
        ("gemini-1.5-flash", "google"),
        ("gemini-1.5-pro", "google"),
        ("claude-opus-4-5-thinking", "anthropic-alias"),
        ("claude-opus-4-5", "anthropic-alias"),
        ("claude-sonnet-4-5", "anthropic-alias"),
        ("claude-sonnet-4", "anthropic-alias"),
        ("claude-3-opus", "anthropic-alias"),
        ("claude-3-5-sonnet", "anthropic-alias"),
        ("claude-3-sonnet", "anthropic-alias"),
        ("claude-3-haiku", "anthropic-alias"),
        ("gpt-4o", "openai-alias"),
        ("gpt-4o-mini", "openai-alias"),
        ("gpt-4-turbo", "openai-alias"),
        ("gpt-4", "openai-alias"),
        ("gpt-3.5-turbo", "openai-alias"),
        ("o1-preview", "openai-alias"),
        ("o1-mini", "openai-alias"),
        ("o3-mini", "openai-alias"),
    ];

    let data: Vec<Value> = entries
        .iter()
        .map(|(id, owner)| json!({"id": id, "object": "model", "owned_by": owner}))
        .collect();
    Json(json!({"object": "list", "data": data})).into_response()
}
