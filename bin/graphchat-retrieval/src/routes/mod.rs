//! Axum router construction.
//!
//! - `GET /health` (open)
//! - `POST /database/chat/stream` (requires `X-API-Key`)

mod chat;
mod health;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use graphchat_app_core::middleware::{cors, require_api_key, trace_middleware};
use graphchat_types::endpoints::DATABASE_PREFIX;

use crate::state::AppState;

/// Build the complete Axum [`Router`] for the retrieval tier.
pub fn build(state: Arc<AppState>) -> Router {
    let database = chat::router().route_layer(middleware::from_fn_with_state(
        state.auth.clone(),
        require_api_key,
    ));

    Router::new()
        .merge(health::router())
        .nest(DATABASE_PREFIX, database)
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(state.config.cors_origins.as_deref()))
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
