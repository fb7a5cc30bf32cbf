//! Open stream listing

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use relaygate_domain::StreamSnapshot;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct StreamList {
    pub count: usize,
    pub streams: BTreeMap<String, StreamSnapshot>,
}

/// `GET /api/streams`
pub async fn list_streams(State(context): State<Arc<AppContext>>) -> Json<StreamList> {
    let streams = context.registry.snapshot();
    Json(StreamList { count: streams.len(), streams })
}
