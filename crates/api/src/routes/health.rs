//! Liveness endpoint.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::AppState;

/// GET `/health` - Liveness probe for load balancers and uptime checks.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "kavera",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates the health routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
