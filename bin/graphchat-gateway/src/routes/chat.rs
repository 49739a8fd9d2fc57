//! `POST /chat` and `POST /chat/stream`.
//!
//! Both paths run the same relay; `/chat` drains it and answers once.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use futures::StreamExt;
use graphchat_app_core::ServerError;
use graphchat_types::endpoints::{CHAT, CHAT_STREAM, CONVERSATION_ID_HEADER};
use graphchat_types::{ChatMessage, ChatRequest, ChatResponse, StreamChunk};
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::state::AppState;

/// Maximum message length in bytes.
const MAX_PROMPT_BYTES: usize = 128 * 1024; // 128 KiB

/// Maximum length of a caller-supplied conversation id.
const MAX_CONVERSATION_ID_LEN: usize = 128;

#[derive(OpenApi)]
#[openapi(
    paths(chat, chat_stream),
    components(schemas(ChatRequest, ChatResponse, ChatMessage, StreamChunk))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(CHAT, post(chat))
        .route(CHAT_STREAM, post(chat_stream))
}

/// A validated chat turn: the conversation it belongs to and the question.
struct Turn {
    conversation_id: String,
    question: ChatMessage,
}

impl Turn {
    fn from_request(req: ChatRequest) -> Result<Self, ServerError> {
        let content = req.message.content;
        if content.trim().is_empty() {
            return Err(ServerError::BadRequest("message content must not be empty".into()));
        }
        if content.len() > MAX_PROMPT_BYTES {
            return Err(ServerError::BadRequest(format!(
                "message too large ({} bytes); maximum is {} bytes",
                content.len(),
                MAX_PROMPT_BYTES,
            )));
        }

        let conversation_id = match req.conversation_id {
            Some(id) => {
                validate_conversation_id(&id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        // The caller's role is not trusted: every inbound message is a user turn.
        let mut question = ChatMessage::user(content);
        question.timestamp = req.message.timestamp;

        Ok(Self {
            conversation_id,
            question,
        })
    }
}

fn validate_conversation_id(id: &str) -> Result<(), ServerError> {
    if id.is_empty() || id.len() > MAX_CONVERSATION_ID_LEN {
        return Err(ServerError::BadRequest(format!(
            "conversation_id must be 1 to {MAX_CONVERSATION_ID_LEN} characters"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ServerError::BadRequest(
            "conversation_id must contain printable ASCII characters only".into(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Aggregated answer", body = ChatResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing API key"),
        (status = 403, description = "Invalid API key"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Answer stream ended abnormally"),
        (status = 502, description = "Retrieval tier failed"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    let turn = Turn::from_request(req)?;
    info!(
        conversation_id = %turn.conversation_id,
        message_len = turn.question.content.len(),
        "chat request"
    );

    let mut frames = state
        .relay
        .relay(turn.conversation_id.clone(), turn.question);

    // Drain to the end: the relay closes the stream only after the turn is
    // recorded, so a follow-up request sees this answer in its history.
    let mut answer = String::new();
    let mut finished = false;
    while let Some(chunk) = frames.next().await {
        if let Some(error) = chunk.error {
            warn!(conversation_id = %turn.conversation_id, %error, "chat answer failed");
            return Err(ServerError::BadGateway(error));
        }
        answer.push_str(&chunk.content);
        finished |= chunk.done;
    }
    if !finished {
        return Err(ServerError::Internal(format!(
            "relay for conversation {} ended without a terminal frame",
            turn.conversation_id
        )));
    }

    Ok(Json(ChatResponse {
        message: ChatMessage::assistant(answer).with_timestamp(Utc::now()),
        conversation_id: turn.conversation_id,
        sources: None,
    }))
}

/// Stream the answer as `text/event-stream`.
///
/// Once admitted the response is always 200: failures after that point arrive
/// as a terminal frame with `error` set.
#[utoipa::path(
    post,
    path = "/chat/stream",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer frames", body = StreamChunk, content_type = "text/event-stream"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing API key"),
        (status = 403, description = "Invalid API key"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    let turn = Turn::from_request(req)?;
    info!(
        conversation_id = %turn.conversation_id,
        message_len = turn.question.content.len(),
        "chat stream request"
    );

    let conversation_header = HeaderValue::from_str(&turn.conversation_id)
        .map_err(|e| ServerError::Internal(format!("conversation id header: {e}")))?;

    let events = state
        .relay
        .relay(turn.conversation_id, turn.question)
        .map(|chunk| Event::default().json_data(chunk));

    let mut response = (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response();
    response
        .headers_mut()
        .insert(CONVERSATION_ID_HEADER, conversation_header);
    Ok(response)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
