//! Anthropic-dialect endpoint: `/v1/messages`.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use gravity_types::protocol::claude::MessagesRequest;
use gravity_types::protocol::gemini::GenerateContentResponse;

use crate::pool::{first_user_text, session_id_for};
use crate::proxy::mappers::claude::{create_claude_sse_stream, to_messages_response};
use crate::proxy::mappers::build_gemini_request;
use crate::proxy::server::AppState;

use super::{
    claude_error, dispatch_with_rotation, sse_response, upstream_status, DispatchError,
};

fn dispatch_error_response(error: DispatchError) -> Response {
    match error {
        DispatchError::NoAccounts => claude_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "overloaded_error",
            "no available accounts",
        ),
        DispatchError::Auth(e) => claude_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "authentication_error",
            &e.to_string(),
        ),
        DispatchError::Upstream { status, body } => {
            claude_error(upstream_status(status), "api_error", &body)
        }
    }
}

pub async fn handle_messages(State(state): State<AppState>, body: Bytes) -> Response {
    let request: MessagesRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return claude_error(
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
    let gemini_body = build_gemini_request(
        &request.messages,
        request.system.as_deref(),
        request.temperature,
        request.max_tokens,
    );
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
        let sse = create_claude_sse_stream(
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
            return claude_error(
                StatusCode::BAD_GATEWAY,
                "api_error",
                &format!("failed to read upstream response: {e}"),
            )
        }
    };
    let gemini: GenerateContentResponse = match serde_json::from_slice(&bytes) {
        Ok(gemini) => gemini,
        Err(e) => {
            return claude_error(
                StatusCode::BAD_GATEWAY,
                "api_error",
                &format!("failed to decode upstream response: {e}"),
            )
        }
    };

    let message = to_messages_response(&gemini, &model);
    state.recorder.log(
        dispatched.account.id,
        &model,
        message.usage.input_tokens as i64,
        message.usage.output_tokens as i64,
        start.elapsed().as_millis() as i64,
        200,
    );

    (StatusCode::OK, Json(message)).into_response()
}
