//! `X-API-Key` authentication.
//!
//! A missing key is rejected with 401, a mismatched key with 403.  Both are
//! rejected before any other middleware (admission included) runs.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use graphchat_types::endpoints::API_KEY_HEADER;
use tracing::warn;

use crate::error::ServerError;

/// The key a service expects callers to present.
#[derive(Clone)]
pub struct ApiKeyAuth {
    expected: Arc<str>,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").finish_non_exhaustive()
    }
}

impl ApiKeyAuth {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    pub fn verify(&self, provided: Option<&str>) -> Result<(), ServerError> {
        match provided {
            None => Err(ServerError::Unauthorized(
                "Missing API key. Please provide X-API-Key header.".into(),
            )),
            Some(key) if key.as_bytes() == self.expected.as_bytes() => Ok(()),
            Some(_) => {
                warn!("invalid API key provided");
                Err(ServerError::Forbidden("Invalid API key.".into()))
            }
        }
    }
}

pub async fn require_api_key(
    State(auth): State<ApiKeyAuth>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match auth.verify(provided) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
