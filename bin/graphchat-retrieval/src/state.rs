//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use graphchat_agent::GraphQueryAgent;
use graphchat_app_core::middleware::ApiKeyAuth;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Validates the gateway's `X-API-Key`.
    pub auth: ApiKeyAuth,
    pub agent: Arc<GraphQueryAgent>,
}
