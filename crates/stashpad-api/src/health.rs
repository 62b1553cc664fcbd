use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::error;

use crate::auth::AppState;
use crate::run_db;

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Ready once the database answers a trivial query.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match run_db(&state, |db| db.ping()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "reason": e.to_string() })),
            )
        }
    }
}
