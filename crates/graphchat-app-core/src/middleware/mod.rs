//! HTTP middleware stack.

pub mod auth;
pub mod cors;
pub mod trace;

pub use auth::{ApiKeyAuth, require_api_key};
pub use trace::trace_middleware;
