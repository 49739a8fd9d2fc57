//! Health endpoint.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use graphchat_types::endpoints::HEALTH;
use serde_json::{Value, json};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(HEALTH, get(get_health))
}

/// Liveness check; needs no API key.
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status":  "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn reports_healthy() {
        let Json(body) = get_health().await;
        assert_eq!(body["status"], "healthy");
    }
}
