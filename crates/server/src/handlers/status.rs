//! Liveness endpoint.

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": state.metrics.snapshot(),
    }))
}
