//! Conversation history endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use graphchat_app_core::ServerError;
use graphchat_types::ChatMessage;
use graphchat_types::endpoints::CONVERSATION_MESSAGES;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_messages), components(schemas(ChatMessage)))]
pub struct ConversationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(CONVERSATION_MESSAGES, get(list_messages))
}

#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages in insertion order", body = [ChatMessage]),
        (status = 401, description = "Missing API key"),
        (status = 403, description = "Invalid API key"),
        (status = 404, description = "Unknown conversation"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    if !state.conversations.contains(&id) {
        return Err(ServerError::NotFound(format!("conversation {id} not found")));
    }
    Ok(Json(state.conversations.history(&id)))
}
