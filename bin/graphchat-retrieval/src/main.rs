//! graphchat-retrieval – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing.
//! 3. Build the graph store and language-model clients and the agent.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use graphchat_agent::{GraphQueryAgent, Neo4jStore, OpenAiCompatModel};
use graphchat_app_core::middleware::ApiKeyAuth;
use graphchat_app_core::{shutdown, telemetry};
use tracing::{info, warn};

use crate::config::{Config, DEFAULT_API_KEY};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    telemetry::init(&cfg.log_level, cfg.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "graphchat-retrieval starting");

    if cfg.api_key == DEFAULT_API_KEY {
        warn!("RETRIEVAL_API_KEY is not set; using the default key");
    }

    // ── 3. Agent ───────────────────────────────────────────────────────────────
    let store = Neo4jStore::new(&cfg.neo4j())?;
    let model = OpenAiCompatModel::new(cfg.language_model())?;
    info!(
        graph_uri = %cfg.graph_uri,
        database = %cfg.graph_database,
        llm_base_url = %cfg.llm_base_url,
        llm_model = %cfg.llm_model,
        azure = cfg.llm_api_version.is_some(),
        "agent collaborators configured"
    );
    let agent = GraphQueryAgent::new(Arc::new(store), Arc::new(model), cfg.agent());

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        auth: ApiKeyAuth::new(cfg.api_key.as_str()),
        agent: Arc::new(agent),
    });

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    info!("graphchat-retrieval stopped");
    Ok(())
}
