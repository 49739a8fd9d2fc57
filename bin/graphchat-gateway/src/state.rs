//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use graphchat_app_core::middleware::ApiKeyAuth;

use crate::admission::AdmissionController;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::relay::StreamRelay;

#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Validates the client's `X-API-Key`.
    pub auth: ApiKeyAuth,
    /// One window shared by every chat request.
    pub admission: Arc<AdmissionController>,
    pub conversations: Arc<ConversationStore>,
    pub relay: StreamRelay,
}
