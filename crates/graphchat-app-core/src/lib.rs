//! Plumbing shared by `graphchat-gateway` and `graphchat-retrieval`.
//!
//! - [`error::ServerError`]: the single HTTP error type of both services
//! - [`middleware`]: API-key authentication, trace-id propagation, CORS
//! - [`telemetry`]: `tracing` subscriber initialisation
//! - [`shutdown`]: graceful-shutdown signal
//! - [`env`]: environment-variable helpers used by each service's `Config`

pub mod env;
pub mod error;
pub mod middleware;
pub mod shutdown;
pub mod telemetry;

pub use error::ServerError;
