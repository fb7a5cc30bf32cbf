//! Health check endpoint for monitoring

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;
use crate::utils::health::HealthReport;

/// Get gateway health status
///
/// # Example Response
/// ```json
/// {
///   "status": "ok",
///   "openStreams": 2,
///   "breakers": {
///     "workflow-engine": { "state": "CLOSED", "consecutiveFailures": 0, "consecutiveSuccesses": 4 }
///   }
/// }
/// ```
pub async fn get_health(State(context): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(context.health_check())
}
