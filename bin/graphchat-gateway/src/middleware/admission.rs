//! Admission control for the chat routes.
//!
//! Runs after authentication, so unauthenticated callers never consume
//! capacity.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use graphchat_app_core::ServerError;
use graphchat_types::endpoints::RATE_LIMIT_REMAINING_HEADER;
use tracing::warn;

use crate::admission::{AdmissionController, RateLimitExceeded};

impl From<RateLimitExceeded> for ServerError {
    fn from(e: RateLimitExceeded) -> Self {
        ServerError::RateLimited {
            message: e.to_string(),
            retry_after: e.retry_after,
        }
    }
}

/// Admit the request or answer 429 with `Retry-After`; admitted responses
/// carry `X-RateLimit-Remaining`.
pub async fn admit(
    State(admission): State<Arc<AdmissionController>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match admission.admit(Instant::now()) {
        Ok(remaining) => {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Err(e) => {
            warn!(
                max_requests = e.max_requests,
                window_secs = e.window.as_secs(),
                "request rejected by admission control"
            );
            ServerError::from(e).into_response()
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
