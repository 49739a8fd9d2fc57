//! `POST /database/chat/stream`: run the graph agent and stream its answer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use graphchat_app_core::ServerError;
use graphchat_types::DatabaseChatRequest;
use graphchat_types::endpoints::DATABASE_CHAT_STREAM;
use tracing::info;

use crate::state::AppState;

/// Maximum question length in bytes.
const MAX_QUESTION_BYTES: usize = 128 * 1024; // 128 KiB

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(DATABASE_CHAT_STREAM, post(chat_stream))
}

/// Answer `query` in the context of `history`.
///
/// Always answers 200 with an event stream once the request is valid: agent
/// failures arrive as a terminal frame with `error` set.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DatabaseChatRequest>,
) -> Result<Response, ServerError> {
    let question = req.query.content.trim();
    if question.is_empty() {
        return Err(ServerError::BadRequest("query must not be empty".into()));
    }
    if question.len() > MAX_QUESTION_BYTES {
        return Err(ServerError::BadRequest(format!(
            "query too large ({} bytes); maximum is {} bytes",
            question.len(),
            MAX_QUESTION_BYTES,
        )));
    }

    info!(
        question_len = question.len(),
        history = req.history.len(),
        "database chat stream request"
    );

    let events = state
        .agent
        .answer(question.to_owned(), req.history)
        .map(|chunk| Event::default().json_data(chunk));

    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}
