//! Per-request orchestration shared by the dialect handlers: account
//! selection, token freshness, upstream dispatch, and rotation on failure.

pub mod claude;
pub mod gemini;
pub mod openai;

use std::pin::Pin;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use serde_json::json;

use gravity_types::models::Account;
use gravity_types::protocol::gemini::GenerateContentRequest;

use crate::error::AppError;

use super::server::AppState;

/// A successful dispatch: the 200 upstream response, committed to one
/// account.
pub(crate) struct Dispatched {
    pub response: reqwest::Response,
    pub account: Account,
}

pub(crate) enum DispatchError {
    /// The selector could not produce any account.
    NoAccounts,
    /// Token refresh failed on the initial selection.
    Auth(AppError),
    /// The upstream answered non-200 (after any rotation attempts).
    Upstream { status: u16, body: String },
}

/// Drive one request to a 200 upstream response, rotating accounts on
/// {401, 403, 429} while `auto_rotate` allows and retries remain. Rotation
/// only ever happens here, before any byte is relayed to the client; once
/// this returns the request is committed to the chosen account.
pub(crate) async fn dispatch_with_rotation(
    state: &AppState,
    body: &GenerateContentRequest,
    model: &str,
    session_id: &str,
    stream: bool,
) -> Result<Dispatched, DispatchError> {
    let proxy_cfg = state.config.read().await.proxy.clone();
    let max_attempts = 1 + proxy_cfg.max_retries;
    let mut last_failure: Option<DispatchError> = None;

    for attempt in 0..max_attempts {
        let mut account = match state.selector.select_next(session_id).await {
            Ok(account) => account,
            Err(_) => return Err(last_failure.take().unwrap_or(DispatchError::NoAccounts)),
        };

        if let Err(e) = state
            .refresher
            .ensure_valid_token(&state.store, &mut account)
            .await
        {
            if attempt == 0 {
                return Err(DispatchError::Auth(e));
            }
            last_failure = Some(DispatchError::Auth(e));
            continue;
        }

        let access_token = account.access_token.clone().unwrap_or_default();
        let sent = if stream {
            state
                .upstream
                .stream_generate_content(model, &access_token, body)
                .await
        } else {
            state.upstream.generate_content(model, &access_token, body).await
        };

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("upstream request failed for {}: {}", account.email, e);
                return Err(DispatchError::Upstream { status: 500, body: e.to_string() });
            }
        };

        let status = response.status();
        if status.is_success() {
            state.selector.mark_success(account.id);
            return Ok(Dispatched { response, account });
        }

        let status_code = status.as_u16();
        let error_body = response.text().await.unwrap_or_default();
        state.selector.mark_error(account.id, status_code);

        let rotatable = matches!(status_code, 401 | 403 | 429);
        if proxy_cfg.auto_rotate && rotatable && attempt + 1 < max_attempts {
            tracing::info!(
                "rotating away from {} after HTTP {} (attempt {}/{})",
                account.email,
                status_code,
                attempt + 1,
                max_attempts
            );
            last_failure = Some(DispatchError::Upstream { status: status_code, body: error_body });
            continue;
        }

        return Err(DispatchError::Upstream { status: status_code, body: error_body });
    }

    Err(last_failure.unwrap_or(DispatchError::NoAccounts))
}

/// Render an error body in the OpenAI dialect.
pub(crate) fn openai_error(status: StatusCode, error_type: &str, message: &str) -> Response {
    (
        status,
        axum::Json(json!({"error": {"message": message, "type": error_type}})),
    )
        .into_response()
}

/// Render an error body in the Anthropic dialect.
pub(crate) fn claude_error(status: StatusCode, error_type: &str, message: &str) -> Response {
    (
        status,
        axum::Json(json!({
            "type": "error",
            "error": {"type": error_type, "message": message},
        })),
    )
        .into_response()
}

pub(crate) fn upstream_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Wrap an SSE frame stream into a flushing event-stream response.
pub(crate) fn sse_response(
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
) -> Response {
    match Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(stream))
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("failed to build stream response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
