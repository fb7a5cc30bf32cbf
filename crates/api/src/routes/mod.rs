//! HTTP routes

pub mod chat;
pub mod health;
pub mod streams;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use relaygate_domain::constants::{CHAT_STREAM_ENDPOINT, HEALTH_ENDPOINT, STREAMS_ENDPOINT};

use crate::context::AppContext;

/// Build the gateway router
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route(CHAT_STREAM_ENDPOINT, post(chat::chat_stream).options(chat::preflight))
        .route(STREAMS_ENDPOINT, get(streams::list_streams))
        .route(HEALTH_ENDPOINT, get(health::get_health))
        .with_state(context)
}
