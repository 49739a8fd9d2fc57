//! Axum router construction.
//!
//! - `GET /health` (open)
//! - `POST /chat`, `POST /chat/stream` (API key, then admission control)
//! - `GET /conversations/{id}/messages` (API key)
//! - `GET /api-docs/openapi.json` (open; disable with `GATEWAY_ENABLE_DOCS=false`)

mod chat;
mod conversations;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router, middleware};
use graphchat_app_core::middleware::{cors, require_api_key, trace_middleware};

use crate::middleware::admission::admit;
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the gateway.
pub fn build(state: Arc<AppState>) -> Router {
    let chat = chat::router().route_layer(middleware::from_fn_with_state(
        Arc::clone(&state.admission),
        admit,
    ));

    // Authentication wraps admission, so rejected keys never consume capacity.
    let protected = chat
        .merge(conversations::router())
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_api_key,
        ));

    let mut app = Router::new().merge(health::router()).merge(protected);

    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(state.config.cors_origins.as_deref()))
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
