//! Health endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use graphchat_types::endpoints::HEALTH;
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(HEALTH, get(get_health))
}

/// Liveness check.
///
/// Returns `{"status": "healthy", "version": "...", "rate_limit": {...}}`;
/// needs no API key and does not consume admission capacity.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway is healthy", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let admission = &state.admission;
    Json(json!({
        "status":  "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "rate_limit": {
            "max_requests": admission.max_requests(),
            "window_secs":  admission.window().as_secs(),
            "remaining":    admission.remaining(Instant::now()),
        },
    }))
}
