//! Chat streaming endpoint

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use relaygate_core::SessionMetadata;
use relaygate_domain::constants::{
    CHAT_STREAM_ENDPOINT, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN,
    CORS_EXPOSE_HEADERS, USER_ID_HEADER,
};
use relaygate_domain::ChatRequest;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::utils::logging::error_label;

/// `POST /api/chat/stream`
///
/// Validates the request, then answers with an event stream fed by the chat
/// relay. Invalid requests get a `400` before any session exists.
pub async fn chat_stream(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if let Err(err) = request.validate() {
        warn!(error = error_label(&err), reason = %err, "Rejected chat request");
        return Err(err.into());
    }

    let mut metadata = SessionMetadata::new(CHAT_STREAM_ENDPOINT);
    if let Some(owner) = owner_id(&headers) {
        metadata = metadata.with_owner(owner);
    }

    let chat = Arc::clone(&context.chat);
    let stream = context.streams.create_session(
        move |session| async move { chat.relay(session, request).await },
        metadata,
        context.streams.defaults().clone(),
    );
    info!(session_id = %stream.session_id, "Chat stream opened");

    let mut response = Response::builder().status(StatusCode::OK);
    for (name, value) in stream.headers {
        response = response.header(name, value);
    }
    response
        .body(Body::from_stream(stream.body))
        .map_err(|e| ApiError::Internal(format!("failed to build stream response: {e}")))
}

/// `OPTIONS /api/chat/stream`
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            ("access-control-allow-origin", CORS_ALLOW_ORIGIN),
            ("access-control-allow-methods", CORS_ALLOW_METHODS),
            ("access-control-allow-headers", CORS_ALLOW_HEADERS),
            ("access-control-expose-headers", CORS_EXPOSE_HEADERS),
        ],
    )
}

fn owner_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
