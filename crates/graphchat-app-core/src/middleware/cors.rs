use axum::http::{HeaderName, HeaderValue};
use graphchat_types::endpoints::{CONVERSATION_ID_HEADER, RATE_LIMIT_REMAINING_HEADER};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer from a comma-separated origin list.
///
/// `None` (or a list with no parseable origin) allows any origin; set the
/// service's `*_CORS_ORIGINS` variable in production.
pub fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers([
            HeaderName::from_static(CONVERSATION_ID_HEADER),
            HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        ]);

    let origins: Vec<HeaderValue> = allowed_origins
        .map(|s| s.split(',').filter_map(|o| o.trim().parse().ok()).collect())
        .unwrap_or_default();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
