//! Retrieval-tier configuration, loaded from environment variables at startup.

use std::time::Duration;

use graphchat_agent::{AgentConfig, Neo4jConfig, OpenAiConfig};
use graphchat_app_core::env::{bool_env, env_opt, env_or, parse_env, secs_env};

pub const DEFAULT_API_KEY: &str = "my-secret";

/// Runtime configuration for graphchat-retrieval.
///
/// Every field has a default so the service starts without any environment
/// variables set; the API key and the store/model credentials must be set in
/// production.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:9010"`).
    pub bind_address: String,

    /// Key the gateway presents in `X-API-Key`.
    pub api_key: String,

    /// Neo4j HTTP base URI (default: `"http://localhost:7474"`).
    pub graph_uri: String,
    pub graph_database: String,
    pub graph_username: String,
    pub graph_password: String,

    /// OpenAI-compatible base URL, e.g. `https://api.openai.com/v1`; the
    /// resource endpoint on Azure.
    pub llm_base_url: String,
    pub llm_api_key: String,
    /// Model name, or the deployment id on Azure.
    pub llm_model: String,
    /// Azure `api-version`; when set the model is addressed as an Azure
    /// deployment.
    pub llm_api_version: Option<String>,

    pub max_iterations: usize,
    pub max_result_rows: usize,
    pub max_field_chars: usize,

    /// Deadline for every outbound HTTP call (store and model).
    pub upstream_timeout: Duration,

    /// Comma-separated allowed CORS origins; any origin when unset.
    pub cors_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,hyper=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = AgentConfig::default();
        Self {
            bind_address: env_or("RETRIEVAL_BIND", "0.0.0.0:9010"),
            api_key: env_or("RETRIEVAL_API_KEY", DEFAULT_API_KEY),
            graph_uri: env_or("GRAPH_DATABASE_URI", "http://localhost:7474"),
            graph_database: env_or("GRAPH_DATABASE_NAME", "neo4j"),
            graph_username: env_or("GRAPH_DATABASE_USERNAME", "neo4j"),
            graph_password: env_or("GRAPH_DATABASE_PASSWORD", ""),
            llm_base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key: env_or("LLM_API_KEY", ""),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            llm_api_version: env_opt("LLM_API_VERSION"),
            max_iterations: parse_env("AGENT_MAX_ITERATIONS", defaults.max_iterations),
            max_result_rows: parse_env("AGENT_MAX_RESULT_ROWS", defaults.max_result_rows),
            max_field_chars: parse_env("AGENT_MAX_FIELD_CHARS", defaults.max_field_chars),
            upstream_timeout: secs_env("RETRIEVAL_UPSTREAM_TIMEOUT_SECS", 60),
            cors_origins: env_opt("RETRIEVAL_CORS_ORIGINS"),
            log_level: env_or("RETRIEVAL_LOG", "info"),
            log_json: bool_env("RETRIEVAL_LOG_JSON", false),
        }
    }

    pub fn neo4j(&self) -> Neo4jConfig {
        Neo4jConfig {
            uri: self.graph_uri.clone(),
            database: self.graph_database.clone(),
            username: self.graph_username.clone(),
            password: self.graph_password.clone(),
            timeout: self.upstream_timeout,
        }
    }

    pub fn language_model(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            api_version: self.llm_api_version.clone(),
            timeout: self.upstream_timeout,
        }
    }

    pub fn agent(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations.max(1),
            max_result_rows: self.max_result_rows.max(1),
            max_field_chars: self.max_field_chars,
            ..AgentConfig::default()
        }
    }
}
