//! graphchat-gateway – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing.
//! 3. Build the retrieval client, conversation store and stream relay.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.

mod admission;
mod config;
mod conversation;
mod middleware;
mod relay;
mod routes;
mod state;
mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use graphchat_app_core::middleware::ApiKeyAuth;
use graphchat_app_core::{shutdown, telemetry};
use tracing::{info, warn};

use crate::admission::AdmissionController;
use crate::config::{Config, DEFAULT_API_KEY, DEFAULT_RETRIEVAL_API_KEY};
use crate::conversation::ConversationStore;
use crate::relay::StreamRelay;
use crate::state::AppState;
use crate::upstream::RetrievalClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    telemetry::init(&cfg.log_level, cfg.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "graphchat-gateway starting");

    if cfg.api_key == DEFAULT_API_KEY {
        warn!("GATEWAY_API_KEY is not set; using the default key");
    }
    if cfg.retrieval_api_key == DEFAULT_RETRIEVAL_API_KEY {
        warn!("GATEWAY_RETRIEVAL_API_KEY is not set; using the default key");
    }

    // ── 3. Relay ───────────────────────────────────────────────────────────────
    let retrieval = RetrievalClient::new(
        &cfg.retrieval_url,
        cfg.retrieval_api_key.clone(),
        cfg.upstream_timeout,
    )?;
    info!(
        endpoint = retrieval.endpoint(),
        timeout_secs = cfg.upstream_timeout.as_secs(),
        "retrieval client configured"
    );

    let conversations = Arc::new(ConversationStore::new());
    let relay = StreamRelay::new(Arc::new(retrieval), Arc::clone(&conversations));
    let admission = Arc::new(AdmissionController::new(
        cfg.rate_limit_requests,
        cfg.rate_limit_window,
    ));
    info!(
        max_requests = admission.max_requests(),
        window_secs = admission.window().as_secs(),
        "admission control configured"
    );

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        auth: ApiKeyAuth::new(cfg.api_key.as_str()),
        admission,
        conversations,
        relay,
    });

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, docs = cfg.enable_docs, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    info!("graphchat-gateway stopped");
    Ok(())
}
