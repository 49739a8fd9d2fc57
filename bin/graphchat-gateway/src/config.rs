//! Gateway configuration, loaded from environment variables at startup.

use std::time::Duration;

use graphchat_app_core::env::{bool_env, env_opt, env_or, parse_env, secs_env};

pub const DEFAULT_API_KEY: &str = "dev-api-key";
pub const DEFAULT_RETRIEVAL_API_KEY: &str = "my-secret";

/// Runtime configuration for graphchat-gateway.
///
/// Every field has a default so the gateway starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:9000"`).
    pub bind_address: String,

    /// Key clients present in `X-API-Key`.
    pub api_key: String,

    /// Requests admitted per window, across all clients (default: 10).
    pub rate_limit_requests: usize,
    /// Length of the admission window (default: 60 s).
    pub rate_limit_window: Duration,

    /// Retrieval tier base URL (default: `"http://localhost:9010"`).
    pub retrieval_url: String,
    /// Key the gateway presents to the retrieval tier.
    pub retrieval_api_key: String,
    /// Deadline for connecting to the retrieval tier and for each read.
    pub upstream_timeout: Duration,

    /// Comma-separated allowed CORS origins; any origin when unset.
    pub cors_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,hyper=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("GATEWAY_BIND", "0.0.0.0:9000"),
            api_key: env_or("GATEWAY_API_KEY", DEFAULT_API_KEY),
            rate_limit_requests: parse_env("GATEWAY_RATE_LIMIT_REQUESTS", 10),
            rate_limit_window: secs_env("GATEWAY_RATE_LIMIT_WINDOW_SECS", 60),
            retrieval_url: env_or("GATEWAY_RETRIEVAL_URL", "http://localhost:9010"),
            retrieval_api_key: env_or("GATEWAY_RETRIEVAL_API_KEY", DEFAULT_RETRIEVAL_API_KEY),
            upstream_timeout: secs_env("GATEWAY_UPSTREAM_TIMEOUT_SECS", 60),
            cors_origins: env_opt("GATEWAY_CORS_ORIGINS"),
            enable_docs: bool_env("GATEWAY_ENABLE_DOCS", true),
            log_level: env_or("GATEWAY_LOG", "info"),
            log_json: bool_env("GATEWAY_LOG_JSON", false),
        }
    }
}
