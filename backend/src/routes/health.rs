use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::lifecycle::LifecycleError;
use crate::state::AppState;

/// Liveness plus a store round trip. A lookup of the nil id answering
/// `NotFound` proves the store is reachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.coordinator.get(Uuid::nil()).await {
        Ok(_) | Err(LifecycleError::NotFound(_)) => {
            (StatusCode::OK, Json(json!({ "status": "ok", "store": "ok" })))
        }
        Err(err) => {
            tracing::warn!(error = %err, "health check store probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "store": "unavailable" })),
            )
        }
    }
}
